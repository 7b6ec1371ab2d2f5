//! Read-only user lookups used to resolve collaboration targets and chat
//! counterparts.

use rusqlite::Connection;
use uuid::Uuid;

use nexus_types::models::{Role, User};

use crate::queries::query_user;
use crate::{Database, StoreError, StoreResult};

/// Maximum number of counterparts offered in the chat user list.
pub const CONNECTED_USERS_PAGE_SIZE: u32 = 10;

impl Database {
    pub fn find_user(&self, id: Uuid) -> StoreResult<User> {
        self.with_conn(|conn| lookup_user(conn, id))?
            .ok_or(StoreError::NotFound("user"))
    }

    pub fn list_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        self.get_users_by_role(role)?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Everyone except `user_id`, one page only.
    pub fn connected_users(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.get_users_except(&user_id.to_string(), CONNECTED_USERS_PAGE_SIZE)?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}

/// `find_user` on a connection the caller already holds, so the stores can
/// resolve targets under the same lock as their writes.
pub(crate) fn lookup_user(conn: &Connection, id: Uuid) -> StoreResult<Option<User>> {
    query_user(conn, "id", &id.to_string())?
        .map(User::try_from)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db, user};

    #[test]
    fn list_by_role_filters() {
        let db = db();
        let inv = user(&db, "ivy", Role::Investor);
        user(&db, "eli", Role::Entrepreneur);
        user(&db, "ema", Role::Entrepreneur);

        let entrepreneurs = db.list_by_role(Role::Entrepreneur).unwrap();
        assert_eq!(entrepreneurs.len(), 2);
        assert!(entrepreneurs.iter().all(|u| u.role == Role::Entrepreneur));

        assert_eq!(db.list_by_role(Role::Investor).unwrap(), vec![inv]);
    }

    #[test]
    fn connected_users_excludes_self_and_caps_page() {
        let db = db();
        let me = user(&db, "me", Role::Investor);
        for i in 0..12 {
            user(&db, &format!("peer{:02}", i), Role::Entrepreneur);
        }

        let peers = db.connected_users(me.id).unwrap();
        assert_eq!(peers.len(), CONNECTED_USERS_PAGE_SIZE as usize);
        assert!(peers.iter().all(|u| u.id != me.id));
    }

    #[test]
    fn find_missing_user() {
        let db = db();
        let ent = user(&db, "eli", Role::Entrepreneur);
        assert_eq!(db.find_user(ent.id).unwrap(), ent);

        assert!(matches!(
            db.find_user(Uuid::new_v4()),
            Err(StoreError::NotFound("user"))
        ));
    }
}

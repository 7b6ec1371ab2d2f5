use rusqlite::{Connection, OptionalExtension};

use nexus_types::models::Role;

use crate::error::is_unique_violation;
use crate::models::UserRow;
use crate::{Database, StoreError, StoreResult};

const USER_COLUMNS: &str = "id, name, email, password, role, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, name, email, password_hash, role.as_str()),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::EmailTaken
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_users_by_role(&self, role: Role) -> StoreResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY name, id"
            ))?;
            let rows = stmt
                .query_map([role.as_str()], UserRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_users_except(&self, exclude_id: &str, limit: u32) -> StoreResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id != ?1 ORDER BY name, id LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![exclude_id, limit], UserRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// `column` is always one of our literal column names, never user input.
pub(crate) fn query_user(conn: &Connection, column: &str, value: &str) -> StoreResult<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt.query_row([value], UserRow::from_row).optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::db;

    #[test]
    fn duplicate_email_is_reported() {
        let db = db();
        db.create_user("a", "Ann", "ann@example.com", "h", Role::Investor)
            .unwrap();

        let err = db
            .create_user("b", "Ann Again", "ann@example.com", "h", Role::Entrepreneur)
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));
    }

    #[test]
    fn lookup_by_email() {
        let db = db();
        db.create_user("u-1", "Bo", "bo@example.com", "hash", Role::Entrepreneur)
            .unwrap();

        let by_email = db.get_user_by_email("bo@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u-1");
        assert_eq!(by_email.role().unwrap(), Role::Entrepreneur);
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }
}

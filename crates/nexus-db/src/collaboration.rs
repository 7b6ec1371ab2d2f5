//! Investor to entrepreneur collaboration requests.
//!
//! A pair may hold at most one request. Uniqueness is the table's
//! `UNIQUE(investor_id, entrepreneur_id)` constraint, so concurrent senders
//! cannot both win even across processes sharing the database file.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use nexus_types::models::{CollaborationRequest, RequestStatus, Role};

use crate::error::is_unique_violation;
use crate::models::CollaborationRow;
use crate::directory::lookup_user;
use crate::{Database, StoreError, StoreResult, format_timestamp};

const REQUEST_SELECT: &str = "
    SELECT r.id, r.investor_id, r.entrepreneur_id, r.message, r.status,
           r.created_at, r.updated_at, i.name, i.email, e.name, e.email
    FROM collaboration_requests r
    JOIN users i ON i.id = r.investor_id
    JOIN users e ON e.id = r.entrepreneur_id";

impl Database {
    pub fn send_request(
        &self,
        investor_id: Uuid,
        entrepreneur_id: Uuid,
        message: &str,
    ) -> StoreResult<CollaborationRequest> {
        if message.trim().is_empty() {
            return Err(StoreError::Validation("message is required".into()));
        }

        let id = Uuid::new_v4().to_string();
        let investor = investor_id.to_string();
        let entrepreneur = entrepreneur_id.to_string();

        self.with_conn(|conn| {
            match lookup_user(conn, entrepreneur_id)? {
                Some(target) if target.role == Role::Entrepreneur => {}
                _ => return Err(StoreError::TargetNotFound),
            }

            let now = format_timestamp(Utc::now());
            conn.execute(
                "INSERT INTO collaboration_requests
                    (id, investor_id, entrepreneur_id, message, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
                rusqlite::params![id, investor, entrepreneur, message, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateRequest
                } else {
                    e.into()
                }
            })?;

            info!("Collaboration request {} sent: {} -> {}", id, investor, entrepreneur);
            query_request(conn, &id)?.ok_or(StoreError::NotFound("collaboration request"))
        })
    }

    /// Requests the user takes part in, seen from their side of the market.
    pub fn list_requests_for_user(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> StoreResult<Vec<CollaborationRequest>> {
        let column = match role {
            Role::Investor => "r.investor_id",
            Role::Entrepreneur => "r.entrepreneur_id",
        };
        let sql = format!("{REQUEST_SELECT} WHERE {column} = ?1 ORDER BY r.created_at, r.rowid");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], CollaborationRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(CollaborationRequest::try_from).collect()
        })
    }

    pub fn list_pending_requests(
        &self,
        entrepreneur_id: Uuid,
    ) -> StoreResult<Vec<CollaborationRequest>> {
        let sql = format!(
            "{REQUEST_SELECT} WHERE r.entrepreneur_id = ?1 AND r.status = 'pending'
             ORDER BY r.created_at, r.rowid"
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([entrepreneur_id.to_string()], CollaborationRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(CollaborationRequest::try_from).collect()
        })
    }

    pub fn get_request(&self, request_id: Uuid) -> StoreResult<Option<CollaborationRequest>> {
        self.with_conn(|conn| query_request(conn, &request_id.to_string()))
    }

    /// Records the entrepreneur's decision.
    ///
    /// With `expected = None` this overwrites whatever status is stored, so a
    /// decided request can be flipped again. Passing the status the caller last
    /// saw turns the write into a compare-and-swap that fails with `Conflict`
    /// when someone else got there first.
    pub fn update_request_status(
        &self,
        request_id: Uuid,
        acting_user_id: Uuid,
        new_status: RequestStatus,
        expected: Option<RequestStatus>,
    ) -> StoreResult<CollaborationRequest> {
        if !new_status.is_decision() {
            return Err(StoreError::Validation(
                "status must be accepted or rejected".into(),
            ));
        }

        let id = request_id.to_string();
        self.with_conn(|conn| {
            let current = query_request(conn, &id)?
                .ok_or(StoreError::NotFound("collaboration request"))?;

            if current.entrepreneur_id != acting_user_id {
                return Err(StoreError::Forbidden(
                    "only the receiving entrepreneur may decide this request".into(),
                ));
            }

            let now = format_timestamp(Utc::now());
            let changed = match expected {
                Some(expected) => conn.execute(
                    "UPDATE collaboration_requests SET status = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = ?4",
                    rusqlite::params![new_status.as_str(), now, id, expected.as_str()],
                )?,
                None => conn.execute(
                    "UPDATE collaboration_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![new_status.as_str(), now, id],
                )?,
            };

            if changed == 0 {
                return Err(StoreError::Conflict(format!(
                    "request is {}, not {}",
                    current.status,
                    expected.map(|s| s.as_str()).unwrap_or("present")
                )));
            }

            debug!("Collaboration request {} {} -> {}", id, current.status, new_status);
            query_request(conn, &id)?.ok_or(StoreError::NotFound("collaboration request"))
        })
    }
}

fn query_request(conn: &Connection, id: &str) -> StoreResult<Option<CollaborationRequest>> {
    let row = conn
        .query_row(
            &format!("{REQUEST_SELECT} WHERE r.id = ?1"),
            [id],
            CollaborationRow::from_row,
        )
        .optional()?;

    row.map(CollaborationRequest::try_from).transpose()
}

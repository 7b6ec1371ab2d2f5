use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, collaboration requests, chat)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('investor', 'entrepreneur')),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_users_role ON users(role, name);

            CREATE TABLE collaboration_requests (
                id              TEXT PRIMARY KEY,
                investor_id     TEXT NOT NULL REFERENCES users(id),
                entrepreneur_id TEXT NOT NULL REFERENCES users(id),
                message         TEXT NOT NULL CHECK (length(trim(message)) > 0),
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE(investor_id, entrepreneur_id)
            );

            CREATE INDEX idx_collab_entrepreneur
                ON collaboration_requests(entrepreneur_id, status);

            CREATE TABLE chat_messages (
                id          TEXT PRIMARY KEY,
                sender_id   TEXT NOT NULL REFERENCES users(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                text        TEXT NOT NULL CHECK (length(trim(text)) > 0),
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX idx_chat_pair
                ON chat_messages(sender_id, receiver_id, timestamp);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

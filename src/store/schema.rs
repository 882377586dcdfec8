//! Relational schema for the libSQL backend.
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so it runs on every open.

use libsql::Connection;

use crate::error::DatabaseError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE,
        name TEXT,
        password TEXT,
        profile_uri TEXT
    );

    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        senderId INTEGER,
        receiverId INTEGER,
        text TEXT,
        createdAt INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages(senderId, receiverId);
"#;

/// Create the `users` and `messages` tables if they are missing.
pub async fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(SCHEMA)
        .await
        .map_err(|e| DatabaseError::Schema(format!("Failed to create tables: {e}")))?;
    tracing::info!("Database schema ready");
    Ok(())
}

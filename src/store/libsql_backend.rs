//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Each operation is a single
//! parameterized statement, so SQLite's autocommit makes it atomic.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::schema;
use crate::store::traits::{
    BackendKind, Database, Message, MessageId, NewMessage, NewUser, User, UserId,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and create the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if path.as_os_str() == ":memory:" {
            return Self::new_memory().await;
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Unavailable(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path).build().await.map_err(|e| {
            DatabaseError::Unavailable(format!("Failed to open libSQL database: {e}"))
        })?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Unavailable(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Unavailable(format!("Failed to create connection: {e}")))?;

        schema::init_schema(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, name, password, profile_uri";

const MESSAGE_COLUMNS: &str = "id, senderId, receiverId, text, createdAt";

/// Map a libsql Row to a User.
///
/// Column order matches USER_COLUMNS. `name` and `password` may be NULL on
/// rows written by older clients; they read back as empty strings.
fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    Ok(User {
        id: row.get(0)?,
        email: row.get::<String>(1).unwrap_or_default(),
        name: row.get::<String>(2).unwrap_or_default(),
        password: row.get::<String>(3).unwrap_or_default(),
        profile_uri: row.get(4).ok(),
    })
}

/// Map a libsql Row to a Message. Column order matches MESSAGE_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<Message, libsql::Error> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        text: row.get::<String>(3).unwrap_or_default(),
        created_at: row.get(4)?,
    })
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

/// Map an engine error from a user insert, surfacing the email constraint.
fn user_insert_error(e: libsql::Error, email: &str) -> DatabaseError {
    if is_unique_violation(&e) {
        DatabaseError::DuplicateEmail {
            email: email.to_string(),
        }
    } else {
        DatabaseError::Query(format!("create_user: {e}"))
    }
}

/// Read the `id` produced by an `INSERT ... RETURNING id`.
async fn returned_id(
    rows: &mut libsql::Rows,
    map_err: impl Fn(libsql::Error) -> DatabaseError,
) -> Result<i64, DatabaseError> {
    match rows.next().await.map_err(&map_err)? {
        Some(row) => row.get::<i64>(0).map_err(map_err),
        None => Err(DatabaseError::Query("INSERT returned no id".into())),
    }
}

async fn collect_users(mut rows: libsql::Rows, op: &str) -> Result<Vec<User>, DatabaseError> {
    let mut users = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
    {
        users.push(row_to_user(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?);
    }
    Ok(users)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<UserId, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "INSERT INTO users (email, name, password) VALUES (?1, ?2, ?3) RETURNING id",
                params![user.email.as_str(), user.name.as_str(), user.password.as_str()],
            )
            .await
            .map_err(|e| user_insert_error(e, &user.email))?;

        let id = returned_id(&mut rows, |e| user_insert_error(e, &user.email)).await?;
        debug!(id, email = %user.email, "User inserted into DB");
        Ok(id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_user_by_email: {e}"))),
        }
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_user: {e}"))),
        }
    }

    async fn get_all_users(&self, exclude_id: Option<UserId>) -> Result<Vec<User>, DatabaseError> {
        let conn = self.conn();
        let rows = match exclude_id {
            Some(id) => {
                conn.query(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id != ?1 ORDER BY id ASC"),
                    params![id],
                )
                .await
            }
            None => {
                conn.query(
                    &format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"),
                    (),
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::Query(format!("get_all_users: {e}")))?;

        collect_users(rows, "get_all_users").await
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn save_message(&self, message: &NewMessage) -> Result<MessageId, DatabaseError> {
        let conn = self.conn();
        let map_err = |e: libsql::Error| DatabaseError::Query(format!("save_message: {e}"));
        let mut rows = conn
            .query(
                "INSERT INTO messages (senderId, receiverId, text, createdAt) VALUES (?1, ?2, ?3, ?4) RETURNING id",
                params![
                    message.sender_id,
                    message.receiver_id,
                    message.text.as_str(),
                    message.created_at,
                ],
            )
            .await
            .map_err(map_err)?;

        let id = returned_id(&mut rows, map_err).await?;
        debug!(
            id,
            sender_id = message.sender_id,
            receiver_id = message.receiver_id,
            "Message inserted into DB"
        );
        Ok(id)
    }

    async fn get_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE (senderId = ?1 AND receiverId = ?2) OR (senderId = ?2 AND receiverId = ?1) \
                     ORDER BY createdAt ASC, id ASC"
                ),
                params![a, b],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation: {e}")))?
        {
            messages.push(
                row_to_message(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?,
            );
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Alice".to_string(),
            password: "opaque-credential".to_string(),
        }
    }

    fn new_message(from: UserId, to: UserId, text: &str, at: i64) -> NewMessage {
        NewMessage {
            sender_id: from,
            receiver_id: to,
            text: text.to_string(),
            created_at: at,
        }
    }

    // ── User tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_find_user() {
        let db = test_db().await;
        let id = db.create_user(&new_user("a@x.com")).await.unwrap();
        assert_eq!(id, 1);

        let fetched = db.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.name, "Alice");
        assert_eq!(fetched.password, "opaque-credential");
        assert!(fetched.profile_uri.is_none());

        let by_id = db.find_user(id).await.unwrap().unwrap();
        assert_eq!(by_id, fetched);
    }

    #[tokio::test]
    async fn find_user_not_found() {
        let db = test_db().await;
        assert!(db.find_user_by_email("nobody@x.com").await.unwrap().is_none());
        assert!(db.find_user(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let db = test_db().await;
        db.create_user(&new_user("a@x.com")).await.unwrap();
        assert!(db.find_user_by_email("A@X.COM").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let db = test_db().await;
        db.create_user(&new_user("a@x.com")).await.unwrap();

        let err = db.create_user(&new_user("a@x.com")).await.unwrap_err();
        assert!(
            matches!(err, DatabaseError::DuplicateEmail { ref email } if email == "a@x.com"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn get_all_users_with_exclusion() {
        let db = test_db().await;
        let a = db.create_user(&new_user("a@x.com")).await.unwrap();
        let b = db.create_user(&new_user("b@x.com")).await.unwrap();
        let c = db.create_user(&new_user("c@x.com")).await.unwrap();

        let all: Vec<UserId> = db
            .get_all_users(None)
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(all, vec![a, b, c]);

        let others: Vec<UserId> = db
            .get_all_users(Some(b))
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(others, vec![a, c]);
    }

    // ── Message tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn conversation_is_ordered_and_symmetric() {
        let db = test_db().await;
        db.save_message(&new_message(1, 2, "later", 3000)).await.unwrap();
        db.save_message(&new_message(2, 1, "first", 1000)).await.unwrap();
        db.save_message(&new_message(1, 3, "elsewhere", 2000)).await.unwrap();
        db.save_message(&new_message(1, 2, "tie", 1000)).await.unwrap();

        let forward = db.get_conversation(1, 2).await.unwrap();
        let texts: Vec<&str> = forward.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "tie", "later"]);

        let backward = db.get_conversation(2, 1).await.unwrap();
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn message_ids_increase() {
        let db = test_db().await;
        let m1 = db.save_message(&new_message(1, 2, "hi", 1000)).await.unwrap();
        let m2 = db.save_message(&new_message(2, 1, "yo", 2000)).await.unwrap();
        assert_eq!((m1, m2), (1, 2));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("messenger.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_user(&new_user("a@x.com")).await.unwrap();
            db.save_message(&new_message(1, 1, "note to self", 5)).await.unwrap();
        }
        assert!(path.exists());

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.find_user_by_email("a@x.com").await.unwrap().is_some());
        assert_eq!(db.get_conversation(1, 1).await.unwrap().len(), 1);
        assert_eq!(db.create_user(&new_user("b@x.com")).await.unwrap(), 2);
    }
}

//! Unified `Database` trait — single async interface implemented by both the
//! libSQL backend and the key-value fallback.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DatabaseError;

pub type UserId = i64;
pub type MessageId = i64;

/// A registered user.
///
/// `password` is an opaque credential string; the store never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
    #[serde(default, alias = "profileRef", alias = "profileUri")]
    pub profile_uri: Option<String>,
}

/// Older blobs write `null` for blank text fields.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A direct message between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "senderId", alias = "from_id", alias = "sender_id")]
    pub sender_id: UserId,
    #[serde(rename = "receiverId", alias = "to_id", alias = "receiver_id")]
    pub receiver_id: UserId,
    #[serde(alias = "content")]
    pub text: String,
    /// Epoch milliseconds, assigned by the client.
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: i64,
}

impl Message {
    /// Whether this message belongs to the conversation between `a` and `b`.
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Input for [`Database::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Input for [`Database::save_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub created_at: i64,
}

/// Which backend is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Relational,
    KeyValue,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Relational => f.write_str("libsql"),
            BackendKind::KeyValue => f.write_str("key-value"),
        }
    }
}

/// Backend-agnostic storage for users and messages.
///
/// Implementations must agree on return shapes, error conditions and ordering.
#[async_trait]
pub trait Database: Send + Sync {
    fn kind(&self) -> BackendKind;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a user. Fails with `DuplicateEmail` if the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<UserId, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, DatabaseError>;

    /// All users in ascending id order, minus `exclude_id` if given.
    async fn get_all_users(&self, exclude_id: Option<UserId>) -> Result<Vec<User>, DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    async fn save_message(&self, message: &NewMessage) -> Result<MessageId, DatabaseError>;

    /// Messages between `a` and `b` in either direction, ascending by
    /// `(created_at, id)`.
    async fn get_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>, DatabaseError>;

    /// Flush anything buffered to durable storage.
    async fn flush(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_fields_decode_as_empty() {
        let users: Vec<User> = serde_json::from_str(
            r#"[{"id":1,"email":"a@x.com","name":null,"password":null},{"id":2,"email":"b@x.com"}]"#,
        )
        .unwrap();
        assert_eq!(users[0].name, "");
        assert_eq!(users[0].password, "");
        assert_eq!(users[1].name, "");
        assert!(users[1].profile_uri.is_none());
    }
}

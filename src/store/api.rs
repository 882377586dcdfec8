//! `Store` — the data access API used by the session facade and views.
//!
//! Wraps whichever [`Database`] the selector picked. Integrity rules that
//! must hold for both backends live here rather than in each backend.

use std::sync::Arc;

use chrono::Utc;

use crate::error::DatabaseError;
use crate::store::traits::{
    BackendKind, Database, Message, MessageId, NewMessage, NewUser, User, UserId,
};

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Database>,
}

impl Store {
    pub fn new(backend: Arc<dyn Database>) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Register a user, returning its id.
    pub async fn create_user(&self, user: &NewUser) -> Result<UserId, DatabaseError> {
        self.backend.create_user(user).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        self.backend.find_user_by_email(email).await
    }

    pub async fn find_user(&self, id: UserId) -> Result<Option<User>, DatabaseError> {
        self.backend.find_user(id).await
    }

    /// Everyone except `exclude_id` (typically the signed-in user).
    pub async fn get_all_users(&self, exclude_id: Option<UserId>) -> Result<Vec<User>, DatabaseError> {
        self.backend.get_all_users(exclude_id).await
    }

    // ── Messages ────────────────────────────────────────────────────

    /// Store a message. Both endpoints must be registered users.
    pub async fn save_message(&self, message: &NewMessage) -> Result<MessageId, DatabaseError> {
        for id in [message.sender_id, message.receiver_id] {
            if self.backend.find_user(id).await?.is_none() {
                return Err(DatabaseError::UnknownUser { id });
            }
        }
        self.backend.save_message(message).await
    }

    /// Store a message stamped with the current wall-clock time.
    pub async fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        text: &str,
    ) -> Result<MessageId, DatabaseError> {
        self.save_message(&NewMessage {
            sender_id,
            receiver_id,
            text: text.to_string(),
            created_at: Utc::now().timestamp_millis(),
        })
        .await
    }

    /// Messages between `a` and `b`, oldest first.
    pub async fn get_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>, DatabaseError> {
        self.backend.get_conversation(a, b).await
    }

    /// Flush the backend. Call once at shutdown.
    pub async fn close(&self) -> Result<(), DatabaseError> {
        self.backend.flush().await
    }
}

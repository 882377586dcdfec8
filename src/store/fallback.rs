//! Key-value fallback backend.
//!
//! Used when the relational engine is unavailable. Both collections live in
//! memory and are written through to two JSON slots after every mutation.
//! All state sits behind a single mutex, so mutations never interleave.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::store::kv::KvStore;
use crate::store::traits::{
    BackendKind, Database, Message, MessageId, NewMessage, NewUser, User, UserId,
};

pub const USERS_KEY: &str = "@messenger_users";
pub const MESSAGES_KEY: &str = "@messenger_messages";

#[derive(Debug)]
struct State {
    loaded: bool,
    users: Vec<User>,
    messages: Vec<Message>,
    /// `None` once the id space is exhausted.
    next_user_id: Option<UserId>,
    next_message_id: Option<MessageId>,
}

impl State {
    fn empty() -> Self {
        Self {
            loaded: false,
            users: Vec::new(),
            messages: Vec::new(),
            next_user_id: Some(1),
            next_message_id: Some(1),
        }
    }
}

/// `max(ids) + 1`, or `1` when empty. `None` if `max` is `i64::MAX`.
fn next_id(ids: impl Iterator<Item = i64>) -> Option<i64> {
    ids.max().map_or(Some(1), |max| max.checked_add(1))
}

fn exhausted(what: &str) -> DatabaseError {
    DatabaseError::Serialization(format!("{what} id space exhausted"))
}

/// Decode a slot. Absent → empty; corrupt → empty with a warning.
fn decode_slot<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!(key, error = %e, "Corrupt fallback slot, starting empty");
            Vec::new()
        }
    }
}

fn encode_slot<T: Serialize>(items: &[T]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// In-memory collections persisted as JSON blobs in a [`KvStore`].
pub struct FallbackBackend {
    kv: Arc<dyn KvStore>,
    state: Mutex<State>,
}

impl FallbackBackend {
    /// Create an unloaded backend. The first operation loads the slots.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            state: Mutex::new(State::empty()),
        }
    }

    /// Create a backend and load it immediately.
    pub async fn open(kv: Arc<dyn KvStore>) -> Result<Self, DatabaseError> {
        let backend = Self::new(kv);
        backend.load().await?;
        Ok(backend)
    }

    /// Re-read both slots, replacing the in-memory collections.
    pub async fn load(&self) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        self.load_into(&mut state).await
    }

    /// Write both collections to their slots.
    pub async fn persist(&self) -> Result<(), DatabaseError> {
        let state = self.loaded_state().await?;
        self.persist_state(&state).await
    }

    async fn load_into(&self, state: &mut State) -> Result<(), DatabaseError> {
        let users: Vec<User> = decode_slot(USERS_KEY, self.kv.get(USERS_KEY).await?);
        let messages: Vec<Message> = decode_slot(MESSAGES_KEY, self.kv.get(MESSAGES_KEY).await?);

        state.next_user_id = next_id(users.iter().map(|u| u.id));
        state.next_message_id = next_id(messages.iter().map(|m| m.id));
        state.users = users;
        state.messages = messages;
        state.loaded = true;

        info!(
            users = state.users.len(),
            messages = state.messages.len(),
            "Fallback store loaded"
        );
        Ok(())
    }

    async fn persist_state(&self, state: &State) -> Result<(), DatabaseError> {
        self.write_through(state, USERS_KEY).await
    }

    /// Write both slots with `changed` last, so a failed write leaves the
    /// durable copy at its pre-mutation snapshot.
    async fn write_through(&self, state: &State, changed: &str) -> Result<(), DatabaseError> {
        let users = encode_slot(&state.users)?;
        let messages = encode_slot(&state.messages)?;
        let (first, second) = if changed == USERS_KEY {
            ((MESSAGES_KEY, messages), (USERS_KEY, users))
        } else {
            ((USERS_KEY, users), (MESSAGES_KEY, messages))
        };
        self.kv.set(first.0, &first.1).await?;
        self.kv.set(second.0, &second.1).await?;
        Ok(())
    }

    /// Lock the state, loading it first if no load has succeeded yet.
    async fn loaded_state(&self) -> Result<MutexGuard<'_, State>, DatabaseError> {
        let mut state = self.state.lock().await;
        if !state.loaded {
            self.load_into(&mut state).await?;
        }
        Ok(state)
    }
}

#[async_trait]
impl Database for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<UserId, DatabaseError> {
        let mut state = self.loaded_state().await?;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(DatabaseError::DuplicateEmail {
                email: user.email.clone(),
            });
        }

        let id = state.next_user_id.ok_or_else(|| exhausted("user"))?;
        state.users.push(User {
            id,
            email: user.email.clone(),
            name: user.name.clone(),
            password: user.password.clone(),
            profile_uri: None,
        });

        if let Err(e) = self.write_through(&state, USERS_KEY).await {
            state.users.pop();
            return Err(e);
        }
        state.next_user_id = id.checked_add(1);

        debug!(id, email = %user.email, "User inserted into fallback store");
        Ok(id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let state = self.loaded_state().await?;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, DatabaseError> {
        let state = self.loaded_state().await?;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_all_users(&self, exclude_id: Option<UserId>) -> Result<Vec<User>, DatabaseError> {
        let state = self.loaded_state().await?;
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| Some(u.id) != exclude_id)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn save_message(&self, message: &NewMessage) -> Result<MessageId, DatabaseError> {
        let mut state = self.loaded_state().await?;

        let id = state.next_message_id.ok_or_else(|| exhausted("message"))?;
        state.messages.push(Message {
            id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text.clone(),
            created_at: message.created_at,
        });

        if let Err(e) = self.write_through(&state, MESSAGES_KEY).await {
            state.messages.pop();
            return Err(e);
        }
        state.next_message_id = id.checked_add(1);

        debug!(
            id,
            sender_id = message.sender_id,
            receiver_id = message.receiver_id,
            "Message inserted into fallback store"
        );
        Ok(id)
    }

    async fn get_conversation(&self, a: UserId, b: UserId) -> Result<Vec<Message>, DatabaseError> {
        let state = self.loaded_state().await?;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages)
    }

    async fn flush(&self) -> Result<(), DatabaseError> {
        let state = self.state.lock().await;
        // Never loaded means nothing changed; writing would clobber the slots.
        if !state.loaded {
            return Ok(());
        }
        self.persist_state(&state).await
    }
}

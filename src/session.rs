//! Session facade — sign-up, sign-in and the current user.
//!
//! Holds no state across restarts; a fresh `Session` starts signed out.

use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::PollConfig;
use crate::credentials::{hash_password, verify_password};
use crate::error::AuthError;
use crate::poller::{ConversationWatch, watch_conversation};
use crate::store::{NewUser, Store, User, UserId};

/// Sign-up form.
#[derive(Debug)]
pub struct SignUp {
    pub email: String,
    pub name: String,
    pub password: SecretString,
}

/// Sign-in form.
#[derive(Debug)]
pub struct SignIn {
    pub email: String,
    pub password: SecretString,
}

pub struct Session {
    store: Store,
    current: RwLock<Option<User>>,
}

impl Session {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register and become the new user.
    pub async fn sign_up(&self, form: SignUp) -> Result<User, AuthError> {
        let password = hash_password(&form.password)?;
        let new_user = NewUser {
            email: form.email,
            name: form.name,
            password,
        };
        let id = self.store.create_user(&new_user).await?;

        let user = User {
            id,
            email: new_user.email,
            name: new_user.name,
            password: new_user.password,
            profile_uri: None,
        };
        info!(user_id = id, "Signed up");
        *self.current.write().await = Some(user.clone());
        Ok(user)
    }

    /// Check credentials and become that user.
    pub async fn sign_in(&self, form: SignIn) -> Result<User, AuthError> {
        let user = self
            .store
            .find_user_by_email(&form.email)
            .await?
            .ok_or_else(|| AuthError::NotFound {
                email: form.email.clone(),
            })?;

        if !verify_password(&form.password, &user.password) {
            return Err(AuthError::WrongPassword);
        }

        info!(user_id = user.id, "Signed in");
        *self.current.write().await = Some(user.clone());
        Ok(user)
    }

    pub async fn sign_out(&self) {
        *self.current.write().await = None;
    }

    pub async fn current_user(&self) -> Option<User> {
        self.current.read().await.clone()
    }

    /// Live view of the signed-in user's conversation with `peer`.
    /// `None` when signed out.
    pub async fn watch_chat(&self, peer: UserId, poll: &PollConfig) -> Option<ConversationWatch> {
        let me = self.current.read().await.as_ref()?.id;
        Some(watch_conversation(self.store.clone(), me, peer, poll.interval))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::DatabaseError;
    use crate::store::{FallbackBackend, KvStore, LibSqlBackend, MemoryKvStore};

    fn sign_up_form(email: &str, password: &str) -> SignUp {
        SignUp {
            email: email.to_string(),
            name: "Alice".to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    fn sign_in_form(email: &str, password: &str) -> SignIn {
        SignIn {
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    async fn sessions() -> Vec<Session> {
        vec![
            Session::new(Store::new(Arc::new(LibSqlBackend::new_memory().await.unwrap()))),
            Session::new(Store::new(Arc::new(FallbackBackend::new(Arc::new(
                MemoryKvStore::new(),
            ))))),
        ]
    }

    #[tokio::test]
    async fn sign_up_sets_current_user() {
        for session in sessions().await {
            assert!(session.current_user().await.is_none());

            let user = session.sign_up(sign_up_form("a@x.com", "p1")).await.unwrap();
            assert_eq!(user.id, 1);
            assert_ne!(user.password, "p1");

            let current = session.current_user().await.unwrap();
            assert_eq!(current, user);
        }
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        for session in sessions().await {
            session.sign_up(sign_up_form("a@x.com", "p1")).await.unwrap();
            session.sign_out().await;
            assert!(session.current_user().await.is_none());

            let err = session
                .sign_in(sign_in_form("a@x.com", "wrong"))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::WrongPassword));
            assert!(session.current_user().await.is_none());

            let user = session.sign_in(sign_in_form("a@x.com", "p1")).await.unwrap();
            assert_eq!(user.email, "a@x.com");
            assert_eq!(session.current_user().await.unwrap().id, user.id);
        }
    }

    #[tokio::test]
    async fn sign_in_unknown_email() {
        for session in sessions().await {
            let err = session
                .sign_in(sign_in_form("ghost@x.com", "p"))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::NotFound { ref email } if email == "ghost@x.com"));
        }
    }

    #[tokio::test]
    async fn watch_chat_requires_sign_in() {
        let session = Session::new(Store::new(Arc::new(FallbackBackend::new(Arc::new(
            MemoryKvStore::new(),
        )))));
        let poll = PollConfig {
            interval: std::time::Duration::from_millis(10),
        };
        assert!(session.watch_chat(2, &poll).await.is_none());

        let me = session.sign_up(sign_up_form("a@x.com", "p1")).await.unwrap();
        let peer = session.sign_up(sign_up_form("b@x.com", "p2")).await.unwrap();
        session.sign_in(sign_in_form("a@x.com", "p1")).await.unwrap();
        session.store().send_message(peer.id, me.id, "hey").await.unwrap();

        let mut view = session.watch_chat(peer.id, &poll).await.unwrap();
        let changed = tokio::time::timeout(std::time::Duration::from_secs(5), view.changed())
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(view.messages()[0].text, "hey");
    }

    #[tokio::test]
    async fn legacy_plaintext_account_signs_in() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(
            "@messenger_users",
            r#"[{"id":1,"email":"a@x.com","name":"A","password":"p1","profile_uri":null}]"#,
        )
        .await
        .unwrap();
        let session = Session::new(Store::new(Arc::new(FallbackBackend::new(kv))));

        let err = session
            .sign_in(sign_in_form("a@x.com", "p2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));

        let user = session.sign_in(sign_in_form("a@x.com", "p1")).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(session.current_user().await.unwrap().name, "A");
    }

    #[tokio::test]
    async fn duplicate_sign_up() {
        for session in sessions().await {
            session.sign_up(sign_up_form("a@x.com", "p1")).await.unwrap();
            let err = session
                .sign_up(sign_up_form("a@x.com", "p2"))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AuthError::Database(DatabaseError::DuplicateEmail { .. })
            ));
        }
    }
}

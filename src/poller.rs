//! Live conversation view by polling.
//!
//! A background task re-runs `get_conversation` on a fixed interval and
//! publishes the list through a `watch` channel whenever it changed. There is
//! no push path; stopping the view aborts the task.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{Message, Store, UserId};

/// Handle to a running conversation poll. Dropping it stops the task.
pub struct ConversationWatch {
    rx: watch::Receiver<Vec<Message>>,
    handle: JoinHandle<()>,
}

impl ConversationWatch {
    /// The latest published message list.
    pub fn messages(&self) -> Vec<Message> {
        self.rx.borrow().clone()
    }

    /// Wait until a poll publishes a different list.
    ///
    /// Returns `false` once the poll task has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// A fresh receiver for another consumer of the same view.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.rx.clone()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ConversationWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start polling the conversation between `a` and `b` every `interval`.
///
/// The first poll runs immediately.
pub fn watch_conversation(
    store: Store,
    a: UserId,
    b: UserId,
    interval: Duration,
) -> ConversationWatch {
    let (tx, rx) = watch::channel(Vec::new());

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.get_conversation(a, b).await {
                Ok(messages) => {
                    let changed = tx.send_if_modified(|current| {
                        if *current == messages {
                            false
                        } else {
                            *current = messages;
                            true
                        }
                    });
                    if changed {
                        debug!(a, b, "Conversation updated");
                    }
                }
                // Keep showing the last good list.
                Err(e) => warn!(a, b, error = %e, "Conversation poll failed"),
            }
            if tx.is_closed() {
                break;
            }
        }
    });

    ConversationWatch { rx, handle }
}

//! Messenger store — local users and direct messages over libSQL, with a
//! key-value fallback.

pub mod config;
pub mod credentials;
pub mod error;
pub mod poller;
pub mod session;
pub mod store;

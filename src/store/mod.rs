//! Persistence layer — libSQL storage with a key-value fallback.

pub mod api;
pub mod fallback;
pub mod kv;
pub mod libsql_backend;
pub mod schema;
pub mod selector;
pub mod traits;

pub use api::Store;
pub use fallback::FallbackBackend;
pub use kv::{FileKvStore, KvStore, MemoryKvStore};
pub use libsql_backend::LibSqlBackend;
pub use selector::init_db;
pub use traits::{BackendKind, Database, Message, MessageId, NewMessage, NewUser, User, UserId};

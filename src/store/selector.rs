//! Backend selection at startup.
//!
//! `init_db` never fails: if the relational engine cannot be opened the
//! key-value fallback takes over for the rest of the process.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{StorageConfig, StorageMode};
use crate::store::api::Store;
use crate::store::fallback::FallbackBackend;
use crate::store::kv::{FileKvStore, KvStore, MemoryKvStore};
use crate::store::libsql_backend::LibSqlBackend;
use crate::store::traits::Database;

/// Pick and open a backend according to `config`.
pub async fn init_db(config: &StorageConfig) -> Store {
    if config.mode == StorageMode::Auto {
        match LibSqlBackend::new_local(&config.db_path).await {
            Ok(backend) => {
                info!(path = %config.db_path.display(), "Using libSQL backend");
                return Store::new(Arc::new(backend));
            }
            Err(e) => {
                warn!(
                    path = %config.db_path.display(),
                    error = %e,
                    "libSQL unavailable, using key-value fallback"
                );
            }
        }
    }

    Store::new(open_fallback(config).await)
}

async fn open_fallback(config: &StorageConfig) -> Arc<dyn Database> {
    let kv: Arc<dyn KvStore> = match &config.kv_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using key-value fallback");
            Arc::new(FileKvStore::new(dir))
        }
        None => {
            info!("Using in-memory key-value fallback");
            Arc::new(MemoryKvStore::new())
        }
    };

    let backend = FallbackBackend::new(kv);
    // A failed load is retried by the first operation.
    if let Err(e) = backend.load().await {
        warn!(error = %e, "Fallback store load failed, will retry on first use");
    }
    Arc::new(backend)
}

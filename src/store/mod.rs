//! Session store for persisting crawl sessions
//!
//! The store is the only shared resource between concurrently running
//! sessions. Every mutation is a targeted partial update scoped to one
//! session under one owner, expressed through the typed [`SessionUpdate`]
//! field mask rather than string-built field paths.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteSessionStore;
pub use traits::{SessionStore, SessionUpdate, StoreError, StoreResult};

use crate::LeadscoutError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Shared handle to a session store
///
/// Sessions never contend for the same record, but they do share the
/// connection; critical sections are kept to single statements or one small
/// transaction.
pub type SharedStore = Arc<Mutex<dyn SessionStore>>;

/// Opens (or creates) a session store at the given path and wraps it in a
/// shared handle
pub fn open_store(path: &Path) -> Result<SharedStore, LeadscoutError> {
    let store = SqliteSessionStore::new(path)?;
    Ok(Arc::new(Mutex::new(store)))
}

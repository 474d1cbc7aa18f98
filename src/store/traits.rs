//! Session store trait and error types

use crate::session::{ContactRecord, CrawlSession, SessionProgress, SessionStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt session record: {0}")]
    Corrupt(String),

    #[error("Session {session_id} already exists for owner {owner_id}")]
    DuplicateSession {
        owner_id: String,
        session_id: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Typed partial update for one session
///
/// Only fields that are `Some` are written; everything else is left
/// untouched. Contact and log updates replace the stored collection with the
/// provided one (the caller always holds the full accumulated state).
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: Option<SessionProgress>,
    pub contacts: Option<Vec<ContactRecord>>,
    pub logs: Option<BTreeMap<u32, String>>,
}

/// Trait for session store backends
///
/// All operations are scoped to one session under one owner. Mutating
/// operations that target a specific session return `Ok(false)` when the
/// session does not exist, so callers can distinguish not-found from other
/// failures.
pub trait SessionStore: Send {
    /// Persists a newly created session
    fn create_session(&mut self, session: &CrawlSession) -> StoreResult<()>;

    /// Loads one session, or `None` if it does not exist
    fn get_session(&self, owner_id: &str, session_id: &str) -> StoreResult<Option<CrawlSession>>;

    /// Loads every session belonging to an owner
    fn list_sessions(&self, owner_id: &str) -> StoreResult<Vec<CrawlSession>>;

    /// Applies a typed partial update to one session
    fn update_session(
        &mut self,
        owner_id: &str,
        session_id: &str,
        update: &SessionUpdate,
    ) -> StoreResult<bool>;

    /// Appends one log line under the given ordinal
    fn append_log(
        &mut self,
        owner_id: &str,
        session_id: &str,
        ordinal: u32,
        message: &str,
    ) -> StoreResult<bool>;

    /// Overwrites the progress counters
    fn update_progress(
        &mut self,
        owner_id: &str,
        session_id: &str,
        progress: &SessionProgress,
    ) -> StoreResult<bool>;

    /// Replaces the stored contact list with the accumulated one
    fn update_contacts(
        &mut self,
        owner_id: &str,
        session_id: &str,
        contacts: &[ContactRecord],
    ) -> StoreResult<bool>;

    /// Removes one session and all of its contacts and logs
    fn delete_session(&mut self, owner_id: &str, session_id: &str) -> StoreResult<bool>;
}

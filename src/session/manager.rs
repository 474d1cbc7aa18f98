//! Session lifecycle management
//!
//! The [`SessionManager`] is the state machine of record for crawl sessions:
//! it creates sessions, validates every status transition against the
//! forward-only lifecycle, and exposes the retrieval, listing, and deletion
//! operations callers poll against.

use crate::session::{
    CrawlSession, JobPage, SessionProgress, SessionStatus, SessionSummary,
};
use crate::store::{SessionStore, SessionUpdate, SharedStore};
use crate::{ContactRecord, LeadscoutError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Parameters for creating a new session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner_id: String,
    pub start_url: String,
    pub depth: u32,
    pub max_pages: u32,
}

/// Manages crawl session lifecycle against the shared store
#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
}

impl SessionManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Creates and persists a new session in the `Initialized` state
    ///
    /// `start_time` is set here, at creation, not when the run begins.
    pub fn create_session(&self, params: NewSession) -> Result<CrawlSession> {
        let session = CrawlSession {
            session_id: generate_session_id(),
            owner_id: params.owner_id,
            start_url: params.start_url,
            depth: params.depth,
            max_pages: params.max_pages,
            status: SessionStatus::Initialized,
            start_time: Utc::now(),
            end_time: None,
            progress: SessionProgress::default(),
            contacts: Vec::new(),
            logs: BTreeMap::new(),
        };

        self.store.lock().unwrap().create_session(&session)?;
        tracing::info!(
            "Created crawl session {} for owner {}",
            session.session_id,
            session.owner_id
        );
        Ok(session)
    }

    /// Loads one session
    pub fn get_session(&self, owner_id: &str, session_id: &str) -> Result<CrawlSession> {
        self.store
            .lock()
            .unwrap()
            .get_session(owner_id, session_id)?
            .ok_or_else(|| not_found(owner_id, session_id))
    }

    /// Lists every session for an owner
    pub fn list_sessions(&self, owner_id: &str) -> Result<Vec<CrawlSession>> {
        Ok(self.store.lock().unwrap().list_sessions(owner_id)?)
    }

    /// Paginated job listing, sorted by start time descending
    pub fn list_jobs(&self, owner_id: &str, page: usize, page_size: usize) -> Result<JobPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let mut summaries: Vec<SessionSummary> = self
            .list_sessions(owner_id)?
            .iter()
            .map(SessionSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let total = summaries.len();
        let total_pages = (total + page_size - 1) / page_size;
        let start = (page - 1) * page_size;
        let items = if start >= total {
            Vec::new()
        } else {
            summaries[start..(start + page_size).min(total)].to_vec()
        };

        Ok(JobPage {
            items,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    /// Removes one session; not-found is reported distinctly
    pub fn delete_session(&self, owner_id: &str, session_id: &str) -> Result<()> {
        if self.store.lock().unwrap().delete_session(owner_id, session_id)? {
            Ok(())
        } else {
            Err(not_found(owner_id, session_id))
        }
    }

    /// Moves a session to a new status, enforcing the forward-only lifecycle
    pub fn set_status(
        &self,
        owner_id: &str,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<()> {
        let update = SessionUpdate {
            status: Some(status),
            ..Default::default()
        };
        self.apply_transition(owner_id, session_id, update)
    }

    /// Applies a terminal snapshot (status plus result fields) in one update
    pub fn finalize(&self, owner_id: &str, session_id: &str, update: SessionUpdate) -> Result<()> {
        self.apply_transition(owner_id, session_id, update)
    }

    fn apply_transition(
        &self,
        owner_id: &str,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<()> {
        let mut store = self.store.lock().unwrap();

        if let Some(to) = update.status {
            let current = store
                .get_session(owner_id, session_id)?
                .ok_or_else(|| not_found(owner_id, session_id))?;

            if !current.status.can_transition_to(to) {
                return Err(LeadscoutError::InvalidTransition {
                    from: current.status,
                    to,
                });
            }
        }

        if store.update_session(owner_id, session_id, &update)? {
            Ok(())
        } else {
            Err(not_found(owner_id, session_id))
        }
    }

    /// Appends one log line
    pub fn append_log(
        &self,
        owner_id: &str,
        session_id: &str,
        ordinal: u32,
        message: &str,
    ) -> Result<()> {
        if self
            .store
            .lock()
            .unwrap()
            .append_log(owner_id, session_id, ordinal, message)?
        {
            Ok(())
        } else {
            Err(not_found(owner_id, session_id))
        }
    }

    /// Overwrites the progress snapshot
    pub fn update_progress(
        &self,
        owner_id: &str,
        session_id: &str,
        progress: &SessionProgress,
    ) -> Result<()> {
        if self
            .store
            .lock()
            .unwrap()
            .update_progress(owner_id, session_id, progress)?
        {
            Ok(())
        } else {
            Err(not_found(owner_id, session_id))
        }
    }

    /// Replaces the accumulated contact list
    pub fn update_contacts(
        &self,
        owner_id: &str,
        session_id: &str,
        contacts: &[ContactRecord],
    ) -> Result<()> {
        if self
            .store
            .lock()
            .unwrap()
            .update_contacts(owner_id, session_id, contacts)?
        {
            Ok(())
        } else {
            Err(not_found(owner_id, session_id))
        }
    }
}

fn not_found(owner_id: &str, session_id: &str) -> LeadscoutError {
    LeadscoutError::SessionNotFound {
        owner_id: owner_id.to_string(),
        session_id: session_id.to_string(),
    }
}

/// Generates a session identifier
///
/// The timestamp keeps ids human-sortable; the random suffix makes ids
/// created within the same second (even concurrently, for the same owner)
/// distinct.
fn generate_session_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", stamp, &suffix[..8])
}

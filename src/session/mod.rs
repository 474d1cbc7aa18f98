//! Crawl session data model
//!
//! A [`CrawlSession`] is both the unit of work and the unit of persistence:
//! one bounded crawl execution together with its configuration, status,
//! progress counters, log stream, and accumulated contacts.

mod manager;

pub use manager::{NewSession, SessionManager};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Hard cap on the recursion depth of a crawl request
pub const DEPTH_LIMIT: u32 = 3;

/// Hard cap on the page budget of a crawl request
pub const PAGE_LIMIT: u32 = 50;

/// Status of a crawl session
///
/// Transitions are forward-only: `Initialized -> Running -> {Completed |
/// Failed}`. A session never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, not yet picked up by the crawl runner
    Initialized,

    /// The crawl runner owns the session and is traversing
    Running,

    /// Traversal finished normally and the final dedup was applied
    Completed,

    /// An error or panic escaped the run
    Failed,
}

impl SessionStatus {
    /// Returns true if no further transitions are permitted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the state machine permits moving from `self` to `to`
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        matches!(
            (self, to),
            (Self::Initialized, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "initialized" => Some(Self::Initialized),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Progress counters for a session
///
/// All three counters are monotonically non-decreasing while the session is
/// running; `pages_visited` never exceeds the session's `max_pages`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub pages_visited: u32,
    pub total_contacts: u32,
    pub unique_contacts: u32,
}

/// A single extracted contact
///
/// `name` and `source` are always present; a record carrying neither an
/// email nor a phone number is invalid and is discarded before storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl ContactRecord {
    /// Returns true if the record has at least one direct contact method
    pub fn has_reachable_detail(&self) -> bool {
        let has_email = self.email.as_deref().is_some_and(|e| !e.trim().is_empty());
        let has_phone = self.phone.as_deref().is_some_and(|p| !p.trim().is_empty());
        has_email || has_phone
    }

    /// Normalized email used for end-of-run dedup, if the record has one
    pub fn dedup_key(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// One bounded crawl execution and its persisted state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSession {
    pub session_id: String,
    pub owner_id: String,
    pub start_url: String,
    pub depth: u32,
    pub max_pages: u32,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: SessionProgress,
    pub contacts: Vec<ContactRecord>,
    /// Log lines keyed by a strictly increasing ordinal starting at 1
    pub logs: BTreeMap<u32, String>,
}

/// Summary of one session, used in job listings
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub start_url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: SessionProgress,
}

impl From<&CrawlSession> for SessionSummary {
    fn from(session: &CrawlSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.status,
            start_url: session.start_url.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            progress: session.progress,
        }
    }
}

/// One page of a job listing
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub items: Vec<SessionSummary>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// End-of-run dedup: unique by lower-cased, trimmed email
///
/// Records without an email (or whose email trims to empty) are always kept
/// as-is; records whose normalized email was already seen are dropped. The
/// raw per-page extraction history is not touched by this; only the returned
/// unique set shrinks.
pub fn dedup_by_email(contacts: &[ContactRecord]) -> Vec<ContactRecord> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for contact in contacts {
        match contact.dedup_key() {
            Some(key) => {
                if seen.insert(key) {
                    unique.push(contact.clone());
                }
            }
            None => unique.push(contact.clone()),
        }
    }

    unique
}

/// Number of distinct non-empty raw emails in the accumulated contacts
///
/// This is the running `unique_contacts` counter written with each progress
/// snapshot; the final snapshot uses [`dedup_by_email`] instead.
pub fn count_distinct_emails(contacts: &[ContactRecord]) -> usize {
    contacts
        .iter()
        .filter_map(|c| c.email.as_deref())
        .filter(|e| !e.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

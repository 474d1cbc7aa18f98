//! Depth- and page-bounded traversal of one site
//!
//! The traversal is a pre-order DFS: links are followed in the order they
//! were discovered in the DOM scan of the current page, and depth exhaustion
//! on an early branch can consume the entire page budget before sibling
//! branches are tried. That is a deliberate predictability trade-off, not a
//! bug. Termination on cyclic link graphs is guaranteed by the visited-set
//! together with the page bound.

use crate::crawler::parser::parse_page;
use crate::crawler::runner::RunError;
use crate::crawler::PageFetcher;
use crate::extraction::{ContactExtractor, ExtractionError};
use crate::session::{count_distinct_emails, ContactRecord, SessionProgress};
use crate::store::{SessionStore, SharedStore};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Owns one session's log stream: the strictly increasing ordinal, the
/// accumulated message map, and the store handle the lines are appended to.
pub(crate) struct SessionRecorder {
    store: SharedStore,
    owner_id: String,
    session_id: String,
    ordinal: u32,
    messages: BTreeMap<u32, String>,
}

impl SessionRecorder {
    pub(crate) fn new(store: SharedStore, owner_id: String, session_id: String) -> Self {
        Self {
            store,
            owner_id,
            session_id,
            ordinal: 0,
            messages: BTreeMap::new(),
        }
    }

    /// Appends one log line under the next ordinal
    pub(crate) fn log(&mut self, message: String) -> Result<(), RunError> {
        self.ordinal += 1;
        tracing::debug!("[{}] log {}: {}", self.session_id, self.ordinal, message);
        self.messages.insert(self.ordinal, message.clone());

        let written = self.store.lock().unwrap().append_log(
            &self.owner_id,
            &self.session_id,
            self.ordinal,
            &message,
        )?;
        if !written {
            return Err(RunError::SessionVanished);
        }
        Ok(())
    }

    /// All lines recorded so far
    pub(crate) fn messages(&self) -> &BTreeMap<u32, String> {
        &self.messages
    }
}

/// Drives the bounded visit order for one session
pub(crate) struct TraversalController<'r> {
    store: SharedStore,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn ContactExtractor>,
    recorder: &'r mut SessionRecorder,
    owner_id: String,
    session_id: String,
    max_pages: usize,
    cancel: CancellationToken,
    visited: HashSet<Url>,
    contacts: Vec<ContactRecord>,
}

impl<'r> TraversalController<'r> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: SharedStore,
        fetcher: Arc<PageFetcher>,
        extractor: Arc<dyn ContactExtractor>,
        recorder: &'r mut SessionRecorder,
        owner_id: String,
        session_id: String,
        max_pages: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            recorder,
            owner_id,
            session_id,
            max_pages,
            cancel,
            visited: HashSet::new(),
            contacts: Vec::new(),
        }
    }

    /// Runs the traversal from the start URL
    pub(crate) async fn run(&mut self, start_url: Url, depth: i64) -> Result<(), RunError> {
        self.visit(start_url, depth).await
    }

    pub(crate) fn pages_visited(&self) -> usize {
        self.visited.len()
    }

    pub(crate) fn into_contacts(self) -> Vec<ContactRecord> {
        self.contacts
    }

    /// Visits one page and, bounds permitting, its outbound links
    ///
    /// Fetch and extraction failures are branch-local: they log a line and
    /// abandon this node's subtree, leaving siblings and ancestors running.
    /// Store failures and cancellation end the whole run.
    fn visit(&mut self, url: Url, depth: i64) -> BoxFuture<'_, Result<(), RunError>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }

            if self.visited.len() >= self.max_pages {
                self.recorder.log(format!(
                    "MaxPagesReached: {} pages reached. Stopping crawl.",
                    self.max_pages
                ))?;
                return Ok(());
            }

            // Idempotent revisit guard and recursion base case
            if self.visited.contains(&url) || depth < 0 {
                return Ok(());
            }

            self.visited.insert(url.clone());

            if self.cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }

            let fetcher = Arc::clone(&self.fetcher);
            let cancel = self.cancel.clone();
            let fetched = tokio::select! {
                result = fetcher.fetch(&url) => result,
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
            };

            let markup = match fetched {
                Ok(markup) => markup,
                Err(error) => {
                    self.log_visit_error(&url, &error.to_string())?;
                    return Ok(());
                }
            };

            let parsed = parse_page(&markup, &url);

            let extractor = Arc::clone(&self.extractor);
            let extraction = extractor
                .extract(&parsed.contact_blocks, url.as_str())
                .await;

            let new_contacts = match extraction {
                Ok(contacts) => contacts,
                Err(ExtractionError::Parse(message)) => {
                    self.recorder.log(format!("JSON Parse Error: {message}"))?;
                    return Ok(());
                }
                Err(error) => {
                    self.log_visit_error(&url, &error.to_string())?;
                    return Ok(());
                }
            };

            self.contacts.extend(new_contacts);
            self.persist_contacts()?;

            self.recorder.log(format!(
                "URL: {} | PagesVisited: {} | CumulativeContacts: {}",
                url,
                self.visited.len(),
                self.contacts.len()
            ))?;
            self.persist_progress()?;

            for link in parsed.links {
                // The page bound is enforced mid-enumeration, not only at
                // entry, so a deep early branch stops sibling expansion.
                if self.visited.len() >= self.max_pages {
                    self.recorder.log(format!(
                        "MaxPagesReached: {} pages reached. Stopping further crawl.",
                        self.max_pages
                    ))?;
                    break;
                }
                self.visit(link, depth - 1).await?;
            }

            Ok(())
        })
    }

    fn log_visit_error(&mut self, url: &Url, error: &str) -> Result<(), RunError> {
        self.recorder.log(format!(
            "URL: {} | PagesVisited: {} | CumulativeContacts: {} | Error: {}",
            url,
            self.visited.len(),
            self.contacts.len(),
            error
        ))
    }

    fn persist_contacts(&self) -> Result<(), RunError> {
        let written = self.store.lock().unwrap().update_contacts(
            &self.owner_id,
            &self.session_id,
            &self.contacts,
        )?;
        if !written {
            return Err(RunError::SessionVanished);
        }
        Ok(())
    }

    fn persist_progress(&self) -> Result<(), RunError> {
        let progress = self.progress_snapshot();
        let written = self.store.lock().unwrap().update_progress(
            &self.owner_id,
            &self.session_id,
            &progress,
        )?;
        if !written {
            return Err(RunError::SessionVanished);
        }
        Ok(())
    }

    pub(crate) fn progress_snapshot(&self) -> SessionProgress {
        SessionProgress {
            pages_visited: self.visited.len() as u32,
            total_contacts: self.contacts.len() as u32,
            unique_contacts: count_distinct_emails(&self.contacts) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SessionStore, SqliteSessionStore};
    use crate::session::{CrawlSession, SessionStatus};
    use chrono::Utc;
    use std::sync::Mutex;

    fn seeded_store(owner: &str, session_id: &str) -> SharedStore {
        let mut store = SqliteSessionStore::new_in_memory().unwrap();
        let session = CrawlSession {
            session_id: session_id.to_string(),
            owner_id: owner.to_string(),
            start_url: "https://example.test/".to_string(),
            depth: 1,
            max_pages: 10,
            status: SessionStatus::Initialized,
            start_time: Utc::now(),
            end_time: None,
            progress: Default::default(),
            contacts: Vec::new(),
            logs: BTreeMap::new(),
        };
        store.create_session(&session).unwrap();
        Arc::new(Mutex::new(store))
    }

    #[test]
    fn test_recorder_ordinals_are_contiguous() {
        let store = seeded_store("owner-1", "s1");
        let mut recorder =
            SessionRecorder::new(store.clone(), "owner-1".to_string(), "s1".to_string());

        recorder.log("first".to_string()).unwrap();
        recorder.log("second".to_string()).unwrap();
        recorder.log("third".to_string()).unwrap();

        let keys: Vec<u32> = recorder.messages().keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);

        let persisted = store
            .lock()
            .unwrap()
            .get_session("owner-1", "s1")
            .unwrap()
            .unwrap();
        assert_eq!(persisted.logs.len(), 3);
        assert_eq!(persisted.logs[&1], "first");
        assert_eq!(persisted.logs[&3], "third");
    }

    #[test]
    fn test_recorder_rejects_vanished_session() {
        let store = seeded_store("owner-1", "s1");
        let mut recorder =
            SessionRecorder::new(store.clone(), "owner-1".to_string(), "s1".to_string());

        store.lock().unwrap().delete_session("owner-1", "s1").unwrap();

        let result = recorder.log("orphan line".to_string());
        assert!(matches!(result, Err(RunError::SessionVanished)));
    }
}

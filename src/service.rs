//! Service facade: the operations exposed to callers
//!
//! This is the boundary a transport layer (REST, RPC, a CLI) talks to:
//! start a crawl and get the session id back immediately, then poll for
//! status and results. Collaborator handles are constructed once and
//! injected; there is no process-global client state.

use crate::config::Config;
use crate::crawler::{CrawlRunner, PageFetcher, RunningSession};
use crate::extraction::ContactExtractor;
use crate::session::{
    CrawlSession, JobPage, NewSession, SessionManager, DEPTH_LIMIT, PAGE_LIMIT,
};
use crate::store::SharedStore;
use crate::{LeadscoutError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// A request to start one crawl session
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub owner_id: String,
    pub start_url: String,
    pub depth: u32,
    pub max_pages: u32,
}

/// The exposed crawl operations, wired over the lifecycle manager and the
/// crawl runner
pub struct CrawlService {
    manager: SessionManager,
    runner: CrawlRunner,
    running: Mutex<HashMap<String, RunningSession>>,
}

impl CrawlService {
    /// Builds the service from configuration and injected collaborators
    pub fn new(
        config: &Config,
        store: SharedStore,
        extractor: Arc<dyn ContactExtractor>,
    ) -> Result<Self> {
        let fetcher = Arc::new(PageFetcher::new(&config.crawler)?);

        Ok(Self {
            manager: SessionManager::new(store.clone()),
            runner: CrawlRunner::new(store, fetcher, extractor),
            running: Mutex::new(HashMap::new()),
        })
    }

    /// Starts a crawl session and returns its id without waiting for the run
    ///
    /// The session is persisted as `initialized` before the background task
    /// takes it to `running`; callers poll [`CrawlService::get_results`] for
    /// progress.
    pub fn start_crawl(&self, request: CrawlRequest) -> Result<String> {
        validate_request(&request)?;

        let session = self.manager.create_session(NewSession {
            owner_id: request.owner_id,
            start_url: request.start_url,
            depth: request.depth,
            max_pages: request.max_pages,
        })?;

        let running = self.runner.spawn(&session);
        self.running
            .lock()
            .unwrap()
            .insert(session.session_id.clone(), running);

        Ok(session.session_id)
    }

    /// Full session record for one session, or not-found
    pub fn get_results(&self, owner_id: &str, session_id: &str) -> Result<CrawlSession> {
        self.manager.get_session(owner_id, session_id)
    }

    /// Paginated job listing for an owner, newest first
    pub fn list_jobs(&self, owner_id: &str, page: usize, page_size: usize) -> Result<JobPage> {
        self.manager.list_jobs(owner_id, page, page_size)
    }

    /// Deletes one session; not-found is reported distinctly
    ///
    /// A still-running session is cancelled first so its background task
    /// stops writing into the void.
    pub fn delete_session(&self, owner_id: &str, session_id: &str) -> Result<()> {
        if let Some(running) = self.running.lock().unwrap().remove(session_id) {
            running.cancel();
        }
        self.manager.delete_session(owner_id, session_id)
    }

    /// Signals cancellation to a running session
    ///
    /// Returns false if the session is not currently tracked as running.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.running.lock().unwrap().get(session_id) {
            Some(running) => {
                running.cancel();
                true
            }
            None => false,
        }
    }

    /// Waits until the given session's background task has fully finished,
    /// including its terminal store write
    pub async fn wait(&self, session_id: &str) {
        let running = self.running.lock().unwrap().remove(session_id);
        if let Some(running) = running {
            running.wait().await;
        }
    }
}

fn validate_request(request: &CrawlRequest) -> Result<()> {
    if request.owner_id.is_empty() {
        return Err(LeadscoutError::InvalidRequest(
            "owner_id cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&request.start_url)
        .map_err(|e| LeadscoutError::InvalidRequest(format!("invalid start_url: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(LeadscoutError::InvalidRequest(format!(
            "start_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if request.depth > DEPTH_LIMIT {
        return Err(LeadscoutError::InvalidRequest(format!(
            "depth must be <= {}, got {}",
            DEPTH_LIMIT, request.depth
        )));
    }

    if request.max_pages == 0 || request.max_pages > PAGE_LIMIT {
        return Err(LeadscoutError::InvalidRequest(format!(
            "max_pages must be between 1 and {}, got {}",
            PAGE_LIMIT, request.max_pages
        )));
    }

    Ok(())
}

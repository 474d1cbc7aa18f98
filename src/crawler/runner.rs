//! Supervised execution of crawl sessions
//!
//! Each session runs as a detached task pair: an inner task executing the
//! traversal, and a supervisor awaiting its join handle. The supervisor is
//! what makes completion observable: even a panic in the run still ends with
//! the session marked `Failed`, never silently stuck in `Running`.

use crate::crawler::traversal::{SessionRecorder, TraversalController};
use crate::crawler::PageFetcher;
use crate::extraction::ContactExtractor;
use crate::session::{dedup_by_email, CrawlSession, SessionManager, SessionProgress, SessionStatus};
use crate::store::{SessionStore, SessionUpdate, SharedStore, StoreError};
use crate::LeadscoutError;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Session-fatal errors during a run
///
/// Branch-local failures (fetch errors, malformed extraction payloads) never
/// surface here; they are logged into the session and absorbed by the
/// traversal. Anything that does surface ends the run and marks the session
/// `Failed`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("session store failure: {0}")]
    Store(#[from] StoreError),

    #[error("session was removed while the crawl was running")]
    SessionVanished,

    #[error("crawl was cancelled")]
    Cancelled,

    #[error("invalid start URL '{url}': {source}")]
    InvalidStartUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Lifecycle(#[from] LeadscoutError),
}

/// Handle to one session's background execution
pub struct RunningSession {
    pub session_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningSession {
    /// Requests cancellation; the traversal checks the signal at the top of
    /// each step and before each fetch
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run (including its terminal store write) to finish
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

/// Spawns and supervises crawl sessions
///
/// Holds the injected collaborator handles; nothing here is process-global.
pub struct CrawlRunner {
    store: SharedStore,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn ContactExtractor>,
}

impl CrawlRunner {
    pub fn new(
        store: SharedStore,
        fetcher: Arc<PageFetcher>,
        extractor: Arc<dyn ContactExtractor>,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
        }
    }

    /// Takes ownership of a session's execution off the caller's critical
    /// path and returns immediately
    pub fn spawn(&self, session: &CrawlSession) -> RunningSession {
        let cancel = CancellationToken::new();

        let inner = tokio::spawn(run_session(
            self.store.clone(),
            self.fetcher.clone(),
            self.extractor.clone(),
            session.clone(),
            cancel.clone(),
        ));

        let handle = tokio::spawn(supervise(
            self.store.clone(),
            session.owner_id.clone(),
            session.session_id.clone(),
            inner,
        ));

        RunningSession {
            session_id: session.session_id.clone(),
            cancel,
            handle,
        }
    }
}

/// Awaits the inner run and guarantees a terminal state is recorded
async fn supervise(
    store: SharedStore,
    owner_id: String,
    session_id: String,
    inner: JoinHandle<Result<(), RunError>>,
) {
    match inner.await {
        Ok(Ok(())) => {
            tracing::info!("Crawl session {} completed", session_id);
        }
        Ok(Err(error)) => {
            // The run already logged the error and set the failed status
            tracing::error!("Crawl session {} failed: {}", session_id, error);
        }
        Err(join_error) => {
            // The run died before it could report; force the terminal state
            // so pollers are not left watching a phantom `running` session.
            tracing::error!("Crawl task for session {} died: {}", session_id, join_error);
            let update = SessionUpdate {
                status: Some(SessionStatus::Failed),
                ..Default::default()
            };
            if let Ok(mut store) = store.lock() {
                let _ = store.update_session(&owner_id, &session_id, &update);
            }
        }
    }
}

async fn run_session(
    store: SharedStore,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn ContactExtractor>,
    session: CrawlSession,
    cancel: CancellationToken,
) -> Result<(), RunError> {
    let manager = SessionManager::new(store.clone());
    let mut recorder = SessionRecorder::new(
        store.clone(),
        session.owner_id.clone(),
        session.session_id.clone(),
    );

    let outcome = execute_run(
        &manager,
        &mut recorder,
        store,
        fetcher,
        extractor,
        &session,
        cancel,
    )
    .await;

    if let Err(error) = &outcome {
        let _ = recorder.log(format!("Error: {error}"));
        if let Err(transition_error) = manager.set_status(
            &session.owner_id,
            &session.session_id,
            SessionStatus::Failed,
        ) {
            tracing::warn!(
                "Could not mark session {} failed: {}",
                session.session_id,
                transition_error
            );
        }
    }

    outcome
}

async fn execute_run(
    manager: &SessionManager,
    recorder: &mut SessionRecorder,
    store: SharedStore,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn ContactExtractor>,
    session: &CrawlSession,
    cancel: CancellationToken,
) -> Result<(), RunError> {
    manager.set_status(
        &session.owner_id,
        &session.session_id,
        SessionStatus::Running,
    )?;

    recorder.log(format!(
        "StartingCrawler from: {} | InitialDepth: {} | MaxPages: {}",
        session.start_url, session.depth, session.max_pages
    ))?;

    // Parsed only after the session is `running`, so a bad URL still walks
    // the ordinary failure path of the state machine.
    let start_url = Url::parse(&session.start_url).map_err(|source| RunError::InvalidStartUrl {
        url: session.start_url.clone(),
        source,
    })?;

    let mut controller = TraversalController::new(
        store,
        fetcher,
        extractor,
        recorder,
        session.owner_id.clone(),
        session.session_id.clone(),
        session.max_pages as usize,
        cancel,
    );

    controller.run(start_url, i64::from(session.depth)).await?;

    let pages_visited = controller.pages_visited();
    let contacts = controller.into_contacts();
    let unique_contacts = dedup_by_email(&contacts);

    recorder.log(format!(
        "FinalResults | PagesVisited: {} | TotalContacts: {} | UniqueContacts: {}",
        pages_visited,
        contacts.len(),
        unique_contacts.len()
    ))?;

    // One update carries the whole terminal snapshot. The raw contact list is
    // persisted as-is; only the unique counter reflects the dedup.
    let update = SessionUpdate {
        status: Some(SessionStatus::Completed),
        end_time: Some(Utc::now()),
        progress: Some(SessionProgress {
            pages_visited: pages_visited as u32,
            total_contacts: contacts.len() as u32,
            unique_contacts: unique_contacts.len() as u32,
        }),
        contacts: Some(contacts),
        logs: Some(recorder.messages().clone()),
    };
    manager.finalize(&session.owner_id, &session.session_id, update)?;

    Ok(())
}

//! Leadscout: a bounded contact crawler with session lifecycle management
//!
//! This crate implements the crawling backend of a lead-generation service:
//! depth- and page-bounded same-site traversal, incremental contact
//! extraction through an external classification collaborator, and durable
//! per-session progress, log, and result state that callers poll
//! asynchronously.

pub mod config;
pub mod crawler;
pub mod extraction;
pub mod service;
pub mod session;
pub mod store;

use thiserror::Error;

/// Main error type for Leadscout operations
#[derive(Debug, Error)]
pub enum LeadscoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extraction::ExtractionError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Session {session_id} not found for owner {owner_id}")]
    SessionNotFound {
        owner_id: String,
        session_id: String,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: session::SessionStatus,
        to: session::SessionStatus,
    },

    #[error("Invalid crawl request: {0}")]
    InvalidRequest(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Leadscout operations
pub type Result<T> = std::result::Result<T, LeadscoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use service::{CrawlRequest, CrawlService};
pub use session::{ContactRecord, CrawlSession, SessionProgress, SessionStatus};
pub use store::{SessionStore, SharedStore};

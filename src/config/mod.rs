//! Configuration handling for Leadscout
//!
//! Configuration is a TOML file with three sections: `[crawler]` for fetch
//! behavior, `[extractor]` for the contact-extraction collaborator, and
//! `[store]` for the session database. Every field has a default, so an
//! empty file is a valid configuration.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, CrawlerConfig, ExtractorConfig, StoreConfig};
pub use validation::validate;

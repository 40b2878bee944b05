pub mod cli;
pub mod crawler;
pub mod export;
pub mod extract;
pub mod fetcher;
pub mod filter;
pub mod models;
pub mod registry;
pub mod rewrite;
pub mod scope;
pub mod status;
pub mod storage;

// Re-export main types for convenience
pub use cli::ScrapeCommand;
pub use crawler::Scraper;
pub use fetcher::{FetchError, FetchResponse, Fetcher};
pub use models::{
    AssetKind, FilterRule, Project, ProjectStatus, ScrapeRequest, ScrapeResponse, StatusReport,
};
pub use registry::{AssetRegistry, PageRegistry};
pub use scope::{Scope, ScopeError};
pub use status::StatusTracker;
pub use storage::ProjectStore;

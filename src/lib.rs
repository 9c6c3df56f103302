pub mod code_generator;
pub mod config;
pub mod delay_manager;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod logger;
pub mod orchestrator;
pub mod report;
pub mod result_store;

// Exporting types for convenience
pub use code_generator::{CodeGenerator, CodeSpace};
pub use config::{Cli, Command, SearchSettings};
pub use delay_manager::DelayManager;
pub use error::{PromoError, Result};
pub use extractor::{Extractor, PageDetails};
pub use fetcher::{FetchOutcome, FetcherConfig, HttpFetcher, InvalidReason, PageFetcher, UrlTemplate};
pub use orchestrator::{RescanPolicy, SearchOptions, SearchOrchestrator, SearchSummary};
pub use result_store::{PromoRecord, PromoStatus, ResultStore, UNKNOWN_ORGANIZATION};

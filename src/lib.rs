// Bill Tracker - Core Library
// Exposes the extraction pipeline and store adapter for the CLI and tests.

pub mod analytics;
pub mod config;
pub mod error;
pub mod expense;
pub mod extraction;
pub mod intake;
pub mod normalize;
pub mod pipeline;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::TrackerError;
pub use expense::{Category, ExpenseFilter, ExpenseRecord, ExpenseUpdate, NewExpense};
pub use extraction::{BillExtractor, GeminiExtractor, EXTRACTION_PROMPT};
pub use intake::{load_images, MediaType, RawImage};
pub use normalize::{normalize_response, NormalizedBill, SkipNotice};
pub use pipeline::{BatchOutcome, BillPipeline, ImageOutcome, ImageReport};
pub use store::{ExpenseStore, MemoryStore, SupabaseStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

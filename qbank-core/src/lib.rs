pub mod config;
pub mod consts;
pub mod document;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod question;
pub mod srs;
pub mod store;
pub mod task;

// Re-export commonly used types
pub use config::{PipelineConfig, SheetMode};
pub use document::{DocumentKind, RawDocument};
pub use error::{ErrorCategory, QbankError};
pub use pipeline::ImportPipeline;
pub use question::ParsedQuestion;
pub use srs::{Grade, SrsRecord, schedule};
pub use task::{DuplicateDecision, ImportOrchestrator, ImportTask, TaskStatus};

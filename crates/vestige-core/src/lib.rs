//! Core types: work items, category convention, summaries, tracing

pub mod summary;
pub mod tracing;
pub mod work;

pub use summary::{CATEGORY_DELIMITER, Category, EM_DASH_DELIMITER, SummaryStyle, parse_category};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use work::{CompletedWork, WorkItem, format_elapsed, kitchen_time};

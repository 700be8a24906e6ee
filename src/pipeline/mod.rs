// Pipeline execution and monitoring module
// Orchestrates a page from pixels to timeline and records what happened

pub mod explainability;
pub mod overlay;
pub mod page;
pub mod trace;

pub use explainability::{DecisionOutcome, DetectionDecision};
pub use overlay::render_overlay;
pub use page::{process_page, process_page_bytes, PageError, PageReport, PageResult, PageStatus};
pub use trace::{read_trace_file, PageStage, TraceBuilder, TraceEntry, TraceError, TraceWriter};

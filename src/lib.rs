// Musescan - Score page to note timeline
// Module declarations

pub mod config;
pub mod detection;
pub mod page;
pub mod pipeline;
pub mod pitch;
pub mod staff;
pub mod timeline;

pub use config::{ConfigError, PipelineConfig};
pub use detection::{Detection, Detectors, HeadDetector, InkHeadDetector, ReplayDetector, SymbolDetector};
pub use page::{ingest_page, ingest_page_file, PageImage};
pub use pipeline::{process_page, render_overlay, PageError, PageResult, PageStatus, TraceWriter};
pub use timeline::{export_midi, TimelineEvent};

// Page module
// Image ingestion, binarization and patch tiling

pub mod binarize;
pub mod ingest;
pub mod tiler;

pub use binarize::BinaryPage;
pub use ingest::{calculate_sha256, ingest_page, ingest_page_file, PageImage, PageImageError};
pub use tiler::{split_into_patches, Patch, PatchGrid, PatchWindow, TilingError};

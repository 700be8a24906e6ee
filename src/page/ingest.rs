// Page ingestion module
// Decodes score page images into grayscale pixels and fingerprints the source

use image::GrayImage;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageImageError {
    #[error("Failed to decode page image: {0}")]
    DecodeError(#[from] image::ImageError),

    #[error("Failed to read page image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Page image is empty")]
    EmptyImage,
}

#[derive(Debug, Clone)]
pub struct PageImage {
    /// Grayscale pixels, 0 = black ink, 255 = paper
    pub pixels: GrayImage,

    /// SHA-256 of the encoded source bytes (hex)
    pub source_sha256: String,
}

impl PageImage {
    /// Wrap already-decoded grayscale pixels
    pub fn from_gray(pixels: GrayImage) -> Result<Self, PageImageError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(PageImageError::EmptyImage);
        }
        let source_sha256 = calculate_sha256(pixels.as_raw());
        Ok(PageImage {
            pixels,
            source_sha256,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Ingest a page image (PNG, JPEG) from raw bytes
pub fn ingest_page(data: &[u8]) -> Result<PageImage, PageImageError> {
    if data.is_empty() {
        return Err(PageImageError::EmptyImage);
    }

    let pixels = image::load_from_memory(data)?.to_luma8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(PageImageError::EmptyImage);
    }

    log::debug!(
        "Ingested page: {}x{} px, {} bytes",
        pixels.width(),
        pixels.height(),
        data.len()
    );

    Ok(PageImage {
        pixels,
        source_sha256: calculate_sha256(data),
    })
}

/// Ingest a page image from disk
pub fn ingest_page_file(path: &std::path::Path) -> Result<PageImage, PageImageError> {
    let data = std::fs::read(path)?;
    ingest_page(&data)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

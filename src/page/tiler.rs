// Patch tiler
// Splits a page into overlapping fixed-size detector windows

use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TilingError {
    #[error("Patch size must be non-zero, got {0}x{1}")]
    ZeroPatchSize(u32, u32),

    #[error("Stride must be non-zero, got {0}x{1}")]
    ZeroStride(u32, u32),
}

/// Position and size of one patch in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PatchWindow {
    /// Copy this window's pixels out of the page
    pub fn crop(&self, page: &GrayImage) -> GrayImage {
        imageops::crop_imm(page, self.x, self.y, self.width, self.height).to_image()
    }

    /// Whether a page-space box (inclusive corners) lies fully inside this window
    pub fn contains(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        let (wx1, wy1) = (self.x as i32, self.y as i32);
        let (wx2, wy2) = (wx1 + self.width as i32, wy1 + self.height as i32);
        x1 >= wx1 && y1 >= wy1 && x2 < wx2 && y2 < wy2
    }
}

/// A cropped patch plus its page offset
#[derive(Debug, Clone)]
pub struct Patch {
    pub window: PatchWindow,
    pub pixels: GrayImage,
}

/// Lazy row-major iterator over patch windows
///
/// Windows start at every multiple of the stride for which a full patch still
/// fits. Partial windows at the right and bottom edges are dropped, so callers
/// that need full coverage must pad the page first.
#[derive(Debug, Clone)]
pub struct PatchGrid {
    page_width: u32,
    page_height: u32,
    patch_width: u32,
    patch_height: u32,
    stride_x: u32,
    stride_y: u32,
    next_x: u32,
    next_y: u32,
}

impl PatchGrid {
    pub fn new(
        page_width: u32,
        page_height: u32,
        patch_size: (u32, u32),
        stride: (u32, u32),
    ) -> Result<Self, TilingError> {
        let (patch_width, patch_height) = patch_size;
        let (stride_x, stride_y) = stride;
        if patch_width == 0 || patch_height == 0 {
            return Err(TilingError::ZeroPatchSize(patch_width, patch_height));
        }
        if stride_x == 0 || stride_y == 0 {
            return Err(TilingError::ZeroStride(stride_x, stride_y));
        }

        Ok(PatchGrid {
            page_width,
            page_height,
            patch_width,
            patch_height,
            stride_x,
            stride_y,
            next_x: 0,
            next_y: 0,
        })
    }

    /// Number of windows the full grid yields
    pub fn patch_count(&self) -> usize {
        if self.patch_width > self.page_width || self.patch_height > self.page_height {
            return 0;
        }
        let cols = (self.page_width - self.patch_width) / self.stride_x + 1;
        let rows = (self.page_height - self.patch_height) / self.stride_y + 1;
        cols as usize * rows as usize
    }
}

impl Iterator for PatchGrid {
    type Item = PatchWindow;

    fn next(&mut self) -> Option<PatchWindow> {
        // u64 sums so large strides cannot overflow
        if self.next_y as u64 + self.patch_height as u64 > self.page_height as u64 {
            return None;
        }
        if self.next_x as u64 + self.patch_width as u64 > self.page_width as u64 {
            // No full column fits at all on this page
            return None;
        }

        let window = PatchWindow {
            x: self.next_x,
            y: self.next_y,
            width: self.patch_width,
            height: self.patch_height,
        };

        let advanced_x = self.next_x as u64 + self.stride_x as u64;
        if advanced_x + self.patch_width as u64 <= self.page_width as u64 {
            self.next_x = advanced_x as u32;
        } else {
            self.next_x = 0;
            self.next_y = (self.next_y as u64 + self.stride_y as u64).min(u32::MAX as u64) as u32;
            if self.next_y as u64 + self.patch_height as u64 > self.page_height as u64 {
                // Park past the end so later calls keep returning None
                self.next_y = self.page_height;
                self.next_x = self.page_width;
            }
        }

        Some(window)
    }
}

/// Tile a page and crop every window
pub fn split_into_patches(
    page: &GrayImage,
    patch_size: (u32, u32),
    stride: (u32, u32),
) -> Result<impl Iterator<Item = Patch> + '_, TilingError> {
    let grid = PatchGrid::new(page.width(), page.height(), patch_size, stride)?;
    Ok(grid.map(move |window| Patch {
        pixels: window.crop(page),
        window,
    }))
}

// Heuristic (rule-based) note-head finder
// Locates the head inside a note crop from row ink density, without a model

use image::GrayImage;

use crate::detection::backend::{DetectorError, HeadDetector};
use crate::detection::types::BoundingBox;
use crate::page::binarize::BinaryPage;

/// Finds the densest band of ink rows in a note crop
///
/// Stems add one or two pixels per row while a filled or hollow head spans
/// most of the crop width, so the head is the band around the peak row.
/// Rows inked across the whole crop are taken to be staff lines: they never
/// seed the band but do not break it either.
pub struct InkHeadDetector {
    config: InkHeadConfig,
}

#[derive(Debug, Clone)]
pub struct InkHeadConfig {
    /// Pixels at or below this value are ink
    pub ink_threshold: u8,

    /// Rows at least this fraction inked count as staff lines
    pub line_fill_ratio: f32,

    /// Rows at least this fraction of the peak row join the head band
    pub band_ratio: f32,
}

impl Default for InkHeadConfig {
    fn default() -> Self {
        InkHeadConfig {
            ink_threshold: 127,
            line_fill_ratio: 0.9,
            band_ratio: 0.5,
        }
    }
}

impl InkHeadDetector {
    pub fn new() -> Self {
        InkHeadDetector {
            config: InkHeadConfig::default(),
        }
    }

    pub fn with_config(config: InkHeadConfig) -> Self {
        InkHeadDetector { config }
    }

    /// Band of rows around the densest non-line row, plus its confidence
    fn find_band(&self, crop: &GrayImage) -> Option<(u32, u32, f32)> {
        let binary = BinaryPage::from_gray(crop, self.config.ink_threshold);
        let counts = binary.row_ink_counts();
        let width = crop.width() as f32;
        if counts.is_empty() || width == 0.0 {
            return None;
        }

        let is_line = |count: u32| count as f32 >= width * self.config.line_fill_ratio;

        // First row wins ties so the result is stable
        let (peak, peak_count) = counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| !is_line(c))
            .fold(None, |best: Option<(usize, u32)>, (i, &c)| match best {
                Some((_, b)) if c <= b => best,
                _ => Some((i, c)),
            })?;
        if peak_count == 0 {
            return None;
        }

        let joins = |count: u32| {
            is_line(count) || count as f32 >= peak_count as f32 * self.config.band_ratio
        };

        let mut top = peak;
        while top > 0 && joins(counts[top - 1]) {
            top -= 1;
        }
        let mut bottom = peak;
        while bottom + 1 < counts.len() && joins(counts[bottom + 1]) {
            bottom += 1;
        }

        Some((top as u32, bottom as u32, peak_count as f32 / width))
    }
}

impl Default for InkHeadDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadDetector for InkHeadDetector {
    fn detect_head(
        &self,
        crop: &GrayImage,
        confidence_floor: f32,
    ) -> Result<Option<BoundingBox>, DetectorError> {
        let Some((top, bottom, confidence)) = self.find_band(crop) else {
            return Ok(None);
        };
        if confidence < confidence_floor {
            return Ok(None);
        }

        // Inclusive corners, like every other box
        Ok(Some(BoundingBox::new(
            0,
            top as i32,
            crop.width() as i32 - 1,
            bottom as i32,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// 10x30 white crop with a stem on the right edge
    fn note_crop() -> GrayImage {
        let mut crop = GrayImage::from_pixel(10, 30, Luma([255]));
        for y in 0..30 {
            crop.put_pixel(9, y, Luma([0]));
        }
        crop
    }

    fn fill_rows(crop: &mut GrayImage, rows: std::ops::Range<u32>, xs: std::ops::Range<u32>) {
        for y in rows {
            for x in xs.clone() {
                crop.put_pixel(x, y, Luma([0]));
            }
        }
    }

    #[test]
    fn test_finds_head_band() {
        let mut crop = note_crop();
        fill_rows(&mut crop, 12..18, 2..8);

        let head = InkHeadDetector::new().detect_head(&crop, 0.01).unwrap().unwrap();
        assert_eq!((head.x1, head.x2), (0, 9));
        assert_eq!((head.y1, head.y2), (12, 17));
        assert_eq!(head.y_center(), 14);
    }

    #[test]
    fn test_staff_line_does_not_win() {
        let mut crop = note_crop();
        fill_rows(&mut crop, 3..4, 0..10);
        fill_rows(&mut crop, 20..25, 3..8);

        let head = InkHeadDetector::new().detect_head(&crop, 0.01).unwrap().unwrap();
        assert_eq!((head.y1, head.y2), (20, 24));
    }

    #[test]
    fn test_line_through_head_keeps_band_whole() {
        let mut crop = note_crop();
        fill_rows(&mut crop, 10..16, 2..8);
        fill_rows(&mut crop, 13..14, 0..10);

        let head = InkHeadDetector::new().detect_head(&crop, 0.01).unwrap().unwrap();
        assert_eq!((head.y1, head.y2), (10, 15));
    }

    #[test]
    fn test_odd_height_head_center_is_exact() {
        let mut crop = note_crop();
        fill_rows(&mut crop, 16..25, 2..8);

        let head = InkHeadDetector::new().detect_head(&crop, 0.01).unwrap().unwrap();
        assert_eq!((head.y1, head.y2), (16, 24));
        assert_eq!(head.y_center(), 20);
    }

    #[test]
    fn test_blank_crop_and_floor() {
        let blank = GrayImage::from_pixel(10, 30, Luma([255]));
        assert!(InkHeadDetector::new().detect_head(&blank, 0.01).unwrap().is_none());

        // Only the stem: peak density 0.1
        let stem_only = note_crop();
        assert!(InkHeadDetector::new().detect_head(&stem_only, 0.5).unwrap().is_none());
    }
}

// Bilevel page representation
// Inverse thresholding and horizontal line extraction for staff-row detection

use image::GrayImage;
use imageproc::contrast::{threshold, ThresholdType};

/// Ink mask of a page, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPage {
    width: u32,
    height: u32,
    ink: Vec<bool>,
}

impl BinaryPage {
    /// Inverse threshold: a pixel is ink when its value is at or below `ink_threshold`
    pub fn from_gray(gray: &GrayImage, ink_threshold: u8) -> Self {
        let mask = threshold(gray, ink_threshold, ThresholdType::BinaryInverted);
        let ink = mask.pixels().map(|p| p[0] == 255).collect();
        BinaryPage {
            width: gray.width(),
            height: gray.height(),
            ink,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    fn is_ink(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.ink[(y * self.width + x) as usize]
    }

    fn row(&self, y: u32) -> &[bool] {
        let start = (y * self.width) as usize;
        &self.ink[start..start + self.width as usize]
    }

    /// Morphological opening with a 1 x `min_run` horizontal line
    ///
    /// Keeps exactly the horizontal ink runs that are at least `min_run` pixels
    /// long, which isolates staff lines from note heads, stems and text.
    pub fn horizontal_opening(&self, min_run: u32) -> BinaryPage {
        if min_run <= 1 {
            return self.clone();
        }

        let mut ink = vec![false; self.ink.len()];
        for y in 0..self.height {
            let row = self.row(y);
            let base = (y * self.width) as usize;
            let mut x = 0usize;
            while x < row.len() {
                if !row[x] {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < row.len() && row[x] {
                    x += 1;
                }
                if (x - start) as u32 >= min_run {
                    ink[base + start..base + x].fill(true);
                }
            }
        }

        BinaryPage {
            width: self.width,
            height: self.height,
            ink,
        }
    }

    /// Number of ink pixels in each row
    pub fn row_ink_counts(&self) -> Vec<u32> {
        (0..self.height)
            .map(|y| self.row(y).iter().filter(|&&on| on).count() as u32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn page_with_runs(width: u32, height: u32, runs: &[(u32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for &(y, x_start, x_end) in runs {
            for x in x_start..x_end {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut img = GrayImage::from_pixel(3, 1, Luma([255]));
        img.put_pixel(0, 0, Luma([127]));
        img.put_pixel(1, 0, Luma([128]));

        let page = BinaryPage::from_gray(&img, 127);
        assert!(page.is_ink(0, 0));
        assert!(!page.is_ink(1, 0));
        assert!(!page.is_ink(2, 0));
        assert!(!page.is_ink(5, 0));
    }

    #[test]
    fn test_opening_keeps_long_runs_only() {
        let img = page_with_runs(100, 3, &[(0, 0, 100), (1, 10, 15), (2, 20, 60)]);
        let page = BinaryPage::from_gray(&img, 127).horizontal_opening(30);

        assert_eq!(page.row_ink_counts(), vec![100, 0, 40]);
    }

    #[test]
    fn test_opening_with_unit_kernel_is_identity() {
        let img = page_with_runs(10, 2, &[(0, 2, 3)]);
        let page = BinaryPage::from_gray(&img, 127);
        assert_eq!(page.horizontal_opening(1), page);
    }
}

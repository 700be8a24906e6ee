// Staff locator
// Finds staff-line rows on a bilevel page and clusters them into 5-line staves

use serde::{Deserialize, Serialize};

use crate::config::StaffConfig;
use crate::page::binarize::BinaryPage;
use image::GrayImage;

/// Row indices of one staff's lines, ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffBlock {
    rows: Vec<u32>,
}

impl StaffBlock {
    /// Build a block from ascending rows
    pub fn new(mut rows: Vec<u32>) -> Self {
        rows.sort_unstable();
        StaffBlock { rows }
    }

    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    /// Mean row position
    pub fn mean_row(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|&r| r as f64).sum::<f64>() / self.rows.len() as f64
    }

    /// Lowest line on the page (largest row index)
    pub fn bottom_row(&self) -> u32 {
        self.rows.last().copied().unwrap_or_default()
    }

    /// Mean distance between consecutive lines
    pub fn line_spacing(&self) -> f64 {
        if self.rows.len() < 2 {
            return 0.0;
        }
        let span = (self.bottom_row() - self.rows[0]) as f64;
        span / (self.rows.len() - 1) as f64
    }
}

/// Rows whose ink count exceeds `fill_ratio` of the page width
pub fn detect_staff_rows(page: &BinaryPage, fill_ratio: f32) -> Vec<u32> {
    let limit = fill_ratio as f64 * page.width() as f64;
    page.row_ink_counts()
        .into_iter()
        .enumerate()
        .filter(|&(_, count)| count as f64 > limit)
        .map(|(y, _)| y as u32)
        .collect()
}

/// Group sorted candidate rows into staff blocks
///
/// Consecutive rows no more than `threshold` apart share a run. A run with at
/// least `group_size` rows becomes a block holding its first `group_size`
/// rows; shorter runs are noise.
pub fn cluster_staff_lines(rows: &[u32], group_size: usize, threshold: u32) -> Vec<StaffBlock> {
    let mut sorted = rows.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut blocks = Vec::new();
    let Some((&first, rest)) = sorted.split_first() else {
        return blocks;
    };

    let mut current = vec![first];
    for &y in rest {
        let last = current[current.len() - 1];
        if y - last <= threshold {
            current.push(y);
        } else {
            if current.len() >= group_size {
                blocks.push(StaffBlock::new(current[..group_size].to_vec()));
            }
            current = vec![y];
        }
    }
    if current.len() >= group_size {
        blocks.push(StaffBlock::new(current[..group_size].to_vec()));
    }

    blocks
}

/// Full staff detection on a grayscale page
///
/// Inverse thresholds the page, keeps horizontal runs at least
/// `width / opening_divisor` long, then detects and clusters staff rows.
pub fn locate_staves(page: &GrayImage, config: &StaffConfig) -> Vec<StaffBlock> {
    let binary = BinaryPage::from_gray(page, config.binarize_threshold);
    let min_run = page.width() / config.opening_divisor.max(1);
    let lines = binary.horizontal_opening(min_run);

    let rows = detect_staff_rows(&lines, config.row_fill_ratio);
    let blocks = cluster_staff_lines(&rows, config.group_size, config.cluster_threshold);

    log::info!(
        "Found {} staff-line rows in {} staff blocks",
        rows.len(),
        blocks.len()
    );
    if blocks.is_empty() {
        log::warn!("No staff found on page; note pitches cannot be resolved");
    }

    blocks
}

/// Block whose mean row is closest to `y`; the first block wins ties
pub fn find_nearest_staff_block(y: f64, blocks: &[StaffBlock]) -> Option<(usize, &StaffBlock)> {
    let mut best: Option<(usize, &StaffBlock, f64)> = None;
    for (i, block) in blocks.iter().enumerate() {
        let distance = (block.mean_row() - y).abs();
        match best {
            Some((_, _, d)) if distance >= d => {}
            _ => best = Some((i, block, distance)),
        }
    }
    best.map(|(i, block, _)| (i, block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_cluster_two_staves() {
        let rows = [10, 11, 12, 13, 14, 40, 41, 42, 43, 44];
        let blocks = cluster_staff_lines(&rows, 5, 12);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].rows(), &[10, 11, 12, 13, 14]);
        assert_eq!(blocks[1].rows(), &[40, 41, 42, 43, 44]);
    }

    #[test]
    fn test_cluster_truncates_and_drops_noise() {
        // Seven-row run keeps its first five; three-row run is noise
        let rows = [100, 110, 120, 130, 140, 150, 160, 300, 305, 310];
        let blocks = cluster_staff_lines(&rows, 5, 12);

        assert_eq!(blocks, vec![StaffBlock::new(vec![100, 110, 120, 130, 140])]);
    }

    #[test]
    fn test_cluster_empty_input() {
        assert!(cluster_staff_lines(&[], 5, 12).is_empty());
    }

    #[test]
    fn test_block_geometry() {
        let block = StaffBlock::new(vec![100, 110, 120, 130, 140]);
        assert_eq!(block.mean_row(), 120.0);
        assert_eq!(block.bottom_row(), 140);
        assert_eq!(block.line_spacing(), 10.0);
    }

    #[test]
    fn test_nearest_block_and_ties() {
        let blocks = vec![
            StaffBlock::new(vec![10, 20, 30, 40, 50]),
            StaffBlock::new(vec![110, 120, 130, 140, 150]),
        ];

        assert_eq!(find_nearest_staff_block(35.0, &blocks).unwrap().0, 0);
        assert_eq!(find_nearest_staff_block(200.0, &blocks).unwrap().0, 1);
        // Equidistant (means 30 and 130): first wins
        assert_eq!(find_nearest_staff_block(80.0, &blocks).unwrap().0, 0);
        assert!(find_nearest_staff_block(10.0, &[]).is_none());
    }

    #[test]
    fn test_locate_staves_on_synthetic_page() {
        let mut page = GrayImage::from_pixel(300, 400, Luma([255]));
        for y in [100u32, 110, 120, 130, 140] {
            for x in 0..300 {
                page.put_pixel(x, y, Luma([0]));
            }
        }
        // A note head and stem should not register as staff rows
        for y in 90..125 {
            page.put_pixel(150, y, Luma([0]));
        }
        for y in 118..123 {
            for x in 140..151 {
                page.put_pixel(x, y, Luma([20]));
            }
        }

        let blocks = locate_staves(&page, &StaffConfig::default());
        assert_eq!(blocks, vec![StaffBlock::new(vec![100, 110, 120, 130, 140])]);
    }

    #[test]
    fn test_locate_staves_blank_page() {
        let page = GrayImage::from_pixel(100, 100, Luma([255]));
        assert!(locate_staves(&page, &StaffConfig::default()).is_empty());
    }
}

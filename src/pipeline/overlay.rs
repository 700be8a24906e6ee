// Debug overlay
// Draws staff rows, merged boxes and head positions over the page

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detection::BoundingBox;
use crate::pipeline::explainability::DecisionOutcome;
use crate::pipeline::page::PageResult;

pub const STAFF_COLOR: Rgb<u8> = Rgb([60, 110, 230]);
pub const NOTE_COLOR: Rgb<u8> = Rgb([30, 170, 60]);
pub const REST_COLOR: Rgb<u8> = Rgb([150, 150, 150]);
pub const DROPPED_COLOR: Rgb<u8> = Rgb([220, 40, 40]);
pub const HEAD_COLOR: Rgb<u8> = Rgb([200, 0, 200]);

const HEAD_MARK_RADIUS: f32 = 3.0;

/// Render the page in color with the pipeline's findings on top
///
/// Boxes are not labelled with their pitch; the decisions file carries that.
pub fn render_overlay(page: &GrayImage, result: &PageResult) -> RgbImage {
    let mut canvas = RgbImage::from_fn(page.width(), page.height(), |x, y| {
        let v = page.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    let right = page.width().saturating_sub(1) as f32;

    for block in &result.staff_blocks {
        for &row in block.rows() {
            let y = row as f32;
            draw_line_segment_mut(&mut canvas, (0.0, y), (right, y), STAFF_COLOR);
        }
    }

    for decision in &result.decisions {
        let color = match decision.outcome {
            DecisionOutcome::Resolved { .. } => NOTE_COLOR,
            DecisionOutcome::Rest => REST_COLOR,
            DecisionOutcome::HeadNotFound | DecisionOutcome::NoStaff => DROPPED_COLOR,
        };
        draw_hollow_rect_mut(&mut canvas, box_rect(&decision.bbox), color);

        if let DecisionOutcome::Resolved { head_y, .. } = decision.outcome {
            let (x, y) = (decision.bbox.x_center() as f32, head_y as f32);
            let r = HEAD_MARK_RADIUS;
            draw_line_segment_mut(&mut canvas, (x - r, y), (x + r, y), HEAD_COLOR);
            draw_line_segment_mut(&mut canvas, (x, y - r), (x, y + r), HEAD_COLOR);
        }
    }

    canvas
}

/// Inclusive-corner box as a drawable rectangle
fn box_rect(bbox: &BoundingBox) -> Rect {
    let width = (bbox.x2 - bbox.x1 + 1).max(1) as u32;
    let height = (bbox.y2 - bbox.y1 + 1).max(1) as u32;
    Rect::at(bbox.x1, bbox.y1).of_size(width, height)
}

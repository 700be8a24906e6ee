// Staff locator module

pub mod locator;

pub use locator::{
    cluster_staff_lines, detect_staff_rows, find_nearest_staff_block, locate_staves, StaffBlock,
};

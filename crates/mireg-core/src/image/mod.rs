//! Volumetric images and index grids.

pub mod grid;
#[allow(clippy::module_inception)]
pub mod image;

pub use grid::{generate_grid, ravel_index, unravel_index};
pub use image::Image;

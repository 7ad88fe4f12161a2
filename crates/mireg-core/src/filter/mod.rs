//! Image filters used to build registration pyramids and to resample
//! results onto a reference grid.

pub mod downsample;
pub mod gaussian;
pub mod pyramid;
pub mod resample;

pub use downsample::DownsampleFilter;
pub use gaussian::{GaussianFilter, SigmaUnits};
pub use pyramid::{power_of_two_schedule, MultiResolutionPyramid};
pub use resample::ResampleImageFilter;

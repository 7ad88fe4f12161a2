//! Core imaging types for multi-resolution registration.
//!
//! `mireg-core` holds the volumetric [`Image`] with its physical geometry,
//! parametric spatial transforms, interpolators and the filters used to
//! build registration pyramids (Gaussian smoothing, shrinking, resampling).

pub mod filter;
pub mod image;
pub mod interpolation;
pub mod spatial;
pub mod tensor;
pub mod transform;

pub use image::Image;
pub use spatial::{Direction, Point, Spacing, Vector};

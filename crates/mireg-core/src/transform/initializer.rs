//! Centered transform initialization.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trait_::CenteredTransform;
use crate::image::Image;

/// How the centers of the two images are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializerMode {
    /// Physical centers of the voxel lattices.
    #[default]
    Geometry,
    /// Intensity centroids.
    Moments,
}

/// Places the rotation center at the fixed image center and sets the
/// translation so that the fixed center maps onto the moving center.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenteredTransformInitializer {
    mode: InitializerMode,
}

impl CenteredTransformInitializer {
    pub fn new(mode: InitializerMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> InitializerMode {
        self.mode
    }

    pub fn initialize<B, T, const D: usize>(&self, fixed: &Image<B, D>, moving: &Image<B, D>) -> T
    where
        B: Backend,
        T: CenteredTransform<B, D>,
    {
        let (fixed_center, moving_center) = match self.mode {
            InitializerMode::Geometry => (fixed.physical_center(), moving.physical_center()),
            InitializerMode::Moments => (fixed.center_of_mass(), moving.center_of_mass()),
        };
        let translation = moving_center - fixed_center;
        debug!(
            mode = ?self.mode,
            center = ?fixed_center.to_vec(),
            translation = ?translation.to_vec(),
            "centered transform initialized"
        );
        T::from_center_and_translation(fixed_center, translation, &fixed.device())
    }
}

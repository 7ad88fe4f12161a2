//! Parametric spatial transforms mapping fixed physical space to moving
//! physical space.

pub mod affine;
pub mod initializer;
pub mod rigid;
pub mod trait_;
pub mod translation;

pub use affine::AffineTransform;
pub use initializer::{CenteredTransformInitializer, InitializerMode};
pub use rigid::RigidTransform;
pub use trait_::{CenteredTransform, ParametricTransform, Transform};
pub use translation::TranslationTransform;

//! Physical-space primitives backed by nalgebra.

pub mod direction;
pub mod point;
pub mod vector;

pub use direction::Direction;
pub use point::Point;
pub use vector::{Spacing, Vector};

pub type Point2 = Point<2>;
pub type Point3 = Point<3>;
pub type Vector2 = Vector<2>;
pub type Vector3 = Vector<3>;
pub type Spacing2 = Spacing<2>;
pub type Spacing3 = Spacing<3>;
pub type Direction2 = Direction<2>;
pub type Direction3 = Direction<3>;

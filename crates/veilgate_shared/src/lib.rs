pub mod bounds;
pub mod camera;
pub mod curve;
pub mod frustum;
pub mod geometry;
pub mod transform;

//! Geometry helpers for the rendering boundary.

pub mod bounds;

pub use bounds::Aabb;

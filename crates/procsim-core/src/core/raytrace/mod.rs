pub mod bvh;
pub mod ray;
pub mod reflection;
pub mod source;

pub use bvh::{DiskBvh, DiskHit};
pub use ray::{Aabb, Disk, Ray};
pub use source::SourcePlane;

/// Random number generator used for all ray sampling.
pub type RayRng = rand::rngs::StdRng;

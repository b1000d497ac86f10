// Re-export glam for convenience
pub use glam::*;

// Rig math types
mod transform;
pub use transform::{Transform, TransformArray};

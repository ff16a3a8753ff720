//! Screen-space compensation for overlay glyphs.
//!
//! Markers and labels are unit-sized meshes; the projector computes the scale
//! that keeps them at a constant pixel size under the current camera, and the
//! world position that lifts per-vertex labels above their anchors.

/// Engine-independent camera and viewport description.
pub mod camera;

pub mod projector;

pub use camera::{OverlayCamera, ProjectionMode, Viewport};
pub use projector::{Billboard, OverlayProjector, OverlaySizes};

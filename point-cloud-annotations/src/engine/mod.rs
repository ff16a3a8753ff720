//! Viewer runtime around the measurement and annotation kernels.
//!
//! - `camera`: viewport camera, fly-to flights and surface picking
//! - `core`: app assembly and window configuration

pub mod camera;
pub mod core;

//! Shared tuning constants for the annotation and measurement overlays.
//!
//! Kept in a separate crate so the viewer, the kernel tests and any future
//! tooling read the same pixel sizes, timings and coordinate conventions.

/// Coordinate frame conversion between point-cloud source space and render space.
pub mod coordinate_system;

/// Asset paths for annotation scene files.
pub mod path;

/// Screen-space sizes, colours and timings for overlay rendering.
pub mod render_settings;

/// Length units available for measurement labels.
pub mod units;

//! Measurement chains: ordered point lists with derived distances, area,
//! angles and height, plus the overlay model renderers consume.
//!
//! ## Data Flow
//!
//! ```text
//! pick / drag / RPC
//!   └─> MeasurementChain::{add_point, move_point, remove_point}
//!       ├─> recompute() → ChainOverlay (markers, edges, labels)
//!       └─> EventBus<ChainEvent> → marker_added / marker_moved / ...
//! ```
//!
//! Coordinates are source space (Z up): area is taken over the XY plane and
//! height along Z.

/// Chain state, configuration and point CRUD.
pub mod chain;

/// Pure geometry over point slices.
pub mod geometry;

/// Label number formatting and units.
pub mod labels;

/// Derived per-vertex / per-edge overlay elements and their anchors.
pub mod overlay;

pub mod point;

pub use chain::{ChainConfig, ChainEvent, MeasurementChain, OverlayVisibility};
pub use labels::LengthUnit;
pub use overlay::{Anchor, AnchorKind, ChainOverlay};
pub use point::{MeasurePoint, PickResult, PointAttributes};

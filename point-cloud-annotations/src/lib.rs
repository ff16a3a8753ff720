//! Measurement and annotation overlays for a point cloud viewer.
//!
//! The crate splits into engine-independent kernels and a Bevy runtime:
//!
//! ```text
//! measure/      MeasurementChain: points, derived geometry, overlay anchors
//! projection/   OverlayProjector: world anchors -> screen billboards
//! annotation/   AnnotationTree, layout, insertion sessions, scene files
//! events        EventBus shared by the kernels
//! ─────────────────────────────────────────────────────────────
//! engine/       viewport camera, fly-to, picking, app assembly
//! tools/        measure and annotation tools, per-frame overlays
//! rpc/          JSON-RPC bridge to the host page
//! ```
//!
//! Kernels work in point-cloud source space (Z up); the runtime converts to
//! Bevy's render space (Y up) at its edges.

pub mod annotation;
pub mod engine;
pub mod error;
pub mod events;
pub mod measure;
pub mod projection;
pub mod rpc;
pub mod tools;

pub use engine::core::app_setup::create_app;

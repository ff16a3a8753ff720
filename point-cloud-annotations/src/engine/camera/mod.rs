//! Viewport camera, fly-to navigation and surface picking.
//!
//! Provides free-fly camera controls, eased annotation fly-to flights and the
//! picking seam the measure and annotation tools place points through.

/// Eased, supersedable camera flights.
pub mod fly_to;

/// Ray-to-surface picking behind a trait seam.
pub mod picking;

/// Viewport camera resource and controller system for scene navigation.
pub mod viewport_camera;

pub use fly_to::{CameraFlight, CameraPose, FlightFinished, FlyTo, FlyToRequest};
pub use picking::{GroundPlanePicker, PointPicker, ScenePicker};
pub use viewport_camera::{ViewportCamera, camera_controller};

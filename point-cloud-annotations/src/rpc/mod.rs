//! JSON-RPC 2.0 bridge between the viewer and its host page.
//!
//! The viewer runs inside an iframe; the host drives tools, chains and
//! annotations by posting requests, and listens for notifications about
//! what the user did in the viewport.
//!
//! ```text
//! Host page                      Viewer (iframe)
//!    │ ── request {id} ──────────> │ handle_rpc_request
//!    │                             │   ├─ mutate MeasureTool / AnnotationState
//!    │                             │   └─ queue RpcCommand -> Bevy events
//!    │ <───────── response {id} ── │
//!    │ <──── notification ──────── │ chain / tree events, label frames
//! ```
//!
//! Requests without an `id` are executed but never answered. Handlers work
//! on an [`web_rpc::RpcContext`] rather than on the ECS world directly, so
//! they can be exercised without an `App`.
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! Measurement and annotation errors surface as `-32602`; serialisation
//! failures as `-32603`.
//!
//! ## Existing Methods
//!
//! ### Tool Management
//! - `tool_selection`: Activate the measure or annotation tool
//! - `clear_tool`: Deactivate current tool and abandon gestures in progress
//! - `cancel_insertions`: Cancel every pending annotation insertion
//!
//! ### Measurement
//! - `measure_start`: Start a chain, optionally with name and configuration
//! - `measure_add_point`: Insert a point (appends without `index`)
//! - `measure_remove_point`: Remove a point by index
//! - `measure_move_point`: Move a point to a new position
//! - `measure_configure`: Patch closed/max_points/unit/colour/visibility
//! - `measure_summary`: Derived quantities of one chain or all chains
//! - `measure_delete`: Delete a chain
//!
//! ### Annotations
//! - `annotation_start_insertion`: Begin placing a new annotation marker
//! - `annotation_commit`: Create an annotation at the placed marker
//! - `annotation_list`: Every annotation with its level and state
//! - `annotation_click`: Fly to an annotation's view
//! - `annotation_set_visible`: Show or hide a subtree
//! - `annotation_trigger_action`: Fire one of an annotation's actions
//! - `annotation_delete`: Dispose an annotation and its children
//!
//! ### Notifications
//! `marker_added`, `marker_removed`, `marker_moved`, `marker_dropped`,
//! `measure_labels`, `measure_rejected`, `annotation_added`,
//! `annotation_removed`, `visibility_changed`, `annotation_clicked`,
//! `annotation_action`, `annotation_dialog_open`, `annotation_labels`,
//! `focusing_started`, `focusing_finished`, `tool_state_changed`.

/// Message types, request dispatch and the postMessage transport.
pub mod web_rpc;

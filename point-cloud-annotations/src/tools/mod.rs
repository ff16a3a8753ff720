//! Interactive tools layered over the point cloud viewport.
//!
//! Each tool wraps one of the kernel types ([`crate::measure`],
//! [`crate::annotation`]) in Bevy resources and systems, turns pointer input
//! into kernel calls, and forwards kernel events to the host page as RPC
//! notifications.
//!
//! ## Tool Manager Architecture
//!
//! The `ToolManager` resource keeps tool activation exclusive:
//! - Only one tool is active at a time
//! - Tools are activated via keyboard shortcuts (native) or RPC events (WASM)
//! - Switching or clearing a tool cancels any pending annotation insertion
//! - The annotation tool is held only while an insertion runs; placing or
//!   cancelling the marker releases it, and starting one over RPC takes it
//!
//! ```text
//! Keyboard/RPC Input
//!   └─> ToolSelectionEvent
//!       └─> handle_tool_selection_events()
//!           ├─> Deactivate measure, cancel insertion
//!           ├─> Activate requested tool
//!           └─> Send tool_state_changed to the host
//! ```
//!
//! ## Available Tools
//!
//! ### Measure Tool (`ToolType::Measure`)
//! - **Activation**: `M` key (native) or `tool_selection` RPC with `"measure"`
//! - Left click appends a point to the active chain, starting one if needed
//! - Dragging a marker moves that point; releasing publishes `marker_dropped`
//! - Chains are open or closed, capped by `max_points`, and labelled with
//!   segment lengths, angles, height and area per their visibility flags
//!
//! ### Annotation Tool (`ToolType::Annotation`)
//! - **Activation**: `N` key (native) or `tool_selection` RPC with `"annotation"`
//! - A marker follows the pointer; left release places it and asks the host
//!   for a title via `annotation_dialog_open`, right release cancels
//! - Clicking an annotation label flies the camera to its saved view
//!
//! ## Overlays
//!
//! `overlay` projects every chain once per frame after transform propagation.
//! The frame feeds the 3D marker meshes, native UI labels, and the
//! `measure_labels` notification used by the web build.

/// Annotation insertion, placement dialog handoff and label layout.
pub mod annotation;

/// Multi-point measurement chains with draggable markers.
pub mod measure;

/// Per-frame projection of measurement overlays to screen space.
pub mod overlay;

/// Exclusive tool activation from keyboard shortcuts and RPC.
pub mod tool_manager;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::annotation::InsertionOptions;
use crate::rpc::web_rpc::WebRpcInterface;
use crate::tools::annotation::{AnnotationState, StartInsertionEvent};
use crate::tools::measure::MeasureTool;

/// Tools the viewport can host; at most one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Measure,
    Annotation,
}

impl ToolType {
    /// Parse the identifier used by `tool_selection` requests.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "measure" => Some(Self::Measure),
            "annotation" | "annotate" => Some(Self::Annotation),
            _ => None,
        }
    }

    /// Identifier reported in `tool_state_changed` notifications.
    pub fn to_string(&self) -> &'static str {
        match self {
            Self::Measure => "measure",
            Self::Annotation => "annotation",
        }
    }
}

/// Which tool currently owns pointer input.
#[derive(Resource, Default)]
pub struct ToolManager {
    active_tool: Option<ToolType>,
}

impl ToolManager {
    /// Make `tool_type` the active tool. Returns false if it already was.
    pub fn activate_tool(&mut self, tool_type: ToolType) -> bool {
        if self.active_tool == Some(tool_type) {
            return false;
        }

        self.active_tool = Some(tool_type);
        info!("Active tool: {}", tool_type.to_string());
        true
    }

    pub fn deactivate_current_tool(&mut self) -> Option<ToolType> {
        let previous = self.active_tool.take();
        if let Some(tool) = previous {
            info!("Tool released: {}", tool.to_string());
        }
        previous
    }

    pub fn active_tool(&self) -> Option<ToolType> {
        self.active_tool
    }

    pub fn is_tool_active(&self, tool_type: ToolType) -> bool {
        self.active_tool == Some(tool_type)
    }
}

/// Request to switch the active tool.
#[derive(Event)]
pub struct ToolSelectionEvent {
    pub tool_type: ToolType,
    pub source: ToolSelectionSource,
}

/// Deactivate the current tool and abandon any in-progress gesture.
#[derive(Event)]
pub struct ClearToolEvent {
    pub source: ToolSelectionSource,
}

/// Where a tool switch came from; logged only.
#[derive(Debug, Clone, Copy)]
pub enum ToolSelectionSource {
    Rpc,
    Keyboard,
}

pub fn handle_tool_selection_events(
    mut events: EventReader<ToolSelectionEvent>,
    mut tool_manager: ResMut<ToolManager>,
    mut measure_tool: ResMut<MeasureTool>,
    mut annotations: ResMut<AnnotationState>,
    mut insertion_events: EventWriter<StartInsertionEvent>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        if !tool_manager.activate_tool(event.tool_type) {
            continue;
        }

        measure_tool.set_active(false);
        if annotations.insertion.cancel_all() {
            debug!("Insertion cancelled by switch via {:?}", event.source);
        }

        match event.tool_type {
            ToolType::Measure => {
                measure_tool.set_active(true);
                info!("Measure tool activated via {:?}", event.source);

                rpc_interface.send_notification(
                    "tool_state_changed",
                    serde_json::json!({
                        "tool": "measure",
                        "active": true,
                        "chains": measure_tool.chain_count(),
                    }),
                );
            }
            ToolType::Annotation => {
                info!("Annotation tool activated via {:?}", event.source);
                insertion_events.write(StartInsertionEvent {
                    options: InsertionOptions::default(),
                });

                rpc_interface.send_notification(
                    "tool_state_changed",
                    serde_json::json!({
                        "tool": "annotation",
                        "active": true
                    }),
                );
            }
        }
    }
}

pub fn handle_clear_tool_events(
    mut events: EventReader<ClearToolEvent>,
    mut tool_manager: ResMut<ToolManager>,
    mut measure_tool: ResMut<MeasureTool>,
    mut annotations: ResMut<AnnotationState>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        measure_tool.set_active(false);
        if annotations.insertion.cancel_all() {
            debug!("Insertion cancelled by clear via {:?}", event.source);
        }

        if let Some(previous) = tool_manager.deactivate_current_tool() {
            rpc_interface.send_notification(
                "tool_state_changed",
                serde_json::json!({
                    "tool": previous.to_string(),
                    "active": false
                }),
            );
        }
    }
}

/// M selects measure, N starts an annotation, Escape clears.
#[cfg(not(target_arch = "wasm32"))]
pub fn handle_tool_keyboard_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut tool_events: EventWriter<ToolSelectionEvent>,
    mut clear_events: EventWriter<ClearToolEvent>,
) {
    if keyboard.just_pressed(KeyCode::KeyM) {
        tool_events.write(ToolSelectionEvent {
            tool_type: ToolType::Measure,
            source: ToolSelectionSource::Keyboard,
        });
    }

    if keyboard.just_pressed(KeyCode::KeyN) {
        tool_events.write(ToolSelectionEvent {
            tool_type: ToolType::Annotation,
            source: ToolSelectionSource::Keyboard,
        });
    }

    if keyboard.just_pressed(KeyCode::Escape) {
        clear_events.write(ClearToolEvent {
            source: ToolSelectionSource::Keyboard,
        });
    }
}

/// The web build takes tool changes from the host page only.
#[cfg(target_arch = "wasm32")]
pub fn handle_tool_keyboard_shortcuts() {}

pub struct ToolManagerPlugin;

impl Plugin for ToolManagerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ToolManager>()
            .add_event::<ToolSelectionEvent>()
            .add_event::<ClearToolEvent>()
            .add_systems(
                Update,
                (
                    handle_tool_keyboard_shortcuts,
                    handle_tool_selection_events,
                    handle_clear_tool_events,
                )
                    .chain(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for tool in [ToolType::Measure, ToolType::Annotation] {
            assert_eq!(ToolType::from_string(tool.to_string()), Some(tool));
        }
        assert_eq!(ToolType::from_string("MEASURE"), Some(ToolType::Measure));
        assert_eq!(ToolType::from_string("polygon"), None);
    }

    #[test]
    fn activation_is_exclusive() {
        let mut manager = ToolManager::default();
        assert!(manager.activate_tool(ToolType::Measure));
        assert!(!manager.activate_tool(ToolType::Measure));
        assert!(manager.activate_tool(ToolType::Annotation));
        assert!(!manager.is_tool_active(ToolType::Measure));

        assert_eq!(manager.deactivate_current_tool(), Some(ToolType::Annotation));
        assert_eq!(manager.deactivate_current_tool(), None);
    }
}

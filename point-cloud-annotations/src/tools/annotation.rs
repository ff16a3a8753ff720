use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy::window::PrimaryWindow;
use constants::coordinate_system::{to_render_space, to_source_space};
use constants::render_settings::MARKER_SPHERE_RADIUS;
use serde::Serialize;

use crate::annotation::{
    AnnotationDesc, AnnotationEvent, AnnotationId, AnnotationLayout, AnnotationResult,
    AnnotationTree, InsertionOptions, InsertionOutcome, InsertionSession, PointerButton,
    ViewRecipe, layout_annotations,
};
use crate::engine::camera::{CameraPose, FlightFinished, FlyToRequest, ScenePicker};
use crate::events::ANY_EVENT;
use crate::measure::AnchorKind;
use crate::projection::Billboard;
use crate::rpc::web_rpc::WebRpcInterface;
use crate::tools::measure::{MeasureSettings, MeasureTool};
use crate::tools::overlay::source_space_projector;
use crate::tools::tool_manager::{ToolManager, ToolType};

type AnnotationOutbox = Arc<Mutex<Vec<AnnotationEvent>>>;

/// Annotation hierarchy plus the in-progress insertion, in source space.
#[derive(Resource)]
pub struct AnnotationState {
    pub tree: AnnotationTree,
    pub insertion: InsertionSession,
    /// Placed marker position waiting for the dialog to commit.
    pub pending_position: Option<Vec3>,
    outbox: AnnotationOutbox,
}

impl Default for AnnotationState {
    fn default() -> Self {
        let mut tree = AnnotationTree::new();
        let outbox = AnnotationOutbox::default();
        let sink = outbox.clone();
        tree.events().subscribe(ANY_EVENT, move |event: &AnnotationEvent| {
            if let Ok(mut queue) = sink.lock() {
                queue.push(*event);
            }
        });
        Self {
            tree,
            insertion: InsertionSession::new(),
            pending_position: None,
            outbox,
        }
    }
}

/// Flat listing entry for the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationSummary {
    pub id: u64,
    pub parent: Option<u64>,
    pub title: String,
    pub description: String,
    pub level: usize,
    pub position: Option<[f32; 3]>,
    pub visible: bool,
    pub expanded: bool,
    pub has_view: bool,
}

impl AnnotationState {
    pub fn drain_events(&self) -> Vec<AnnotationEvent> {
        self.outbox
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }

    /// Create an annotation from a dialog result.
    ///
    /// A missing position falls back to the placed insertion marker; a missing
    /// camera view falls back to `view` (the camera at commit time).
    pub fn commit(
        &mut self,
        parent: Option<AnnotationId>,
        mut desc: AnnotationDesc,
        view: Option<CameraPose>,
    ) -> AnnotationResult<AnnotationId> {
        let pending = self.pending_position.take();
        if desc.position.is_none() {
            desc.position = pending;
        }
        if desc.camera_position.is_none() && desc.camera_target.is_none() && desc.radius.is_none()
        {
            if let Some(view) = view {
                desc.camera_position = Some(view.position);
                desc.camera_target = Some(view.target);
            }
        }
        let parent = parent.unwrap_or(self.tree.root());
        self.tree.insert(parent, &desc)
    }

    /// Every annotation below the root, pre-order.
    pub fn summaries(&self) -> Vec<AnnotationSummary> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .filter_map(|id| {
                let node = self.tree.get(id)?;
                Some(AnnotationSummary {
                    id: id.to_raw(),
                    parent: node.parent().map(AnnotationId::to_raw),
                    title: node.title.clone(),
                    description: node.description.clone(),
                    level: self.tree.level(id).ok()?,
                    position: node.position.map(|p| p.to_array()),
                    visible: node.is_visible(),
                    expanded: node.is_expanded(),
                    has_view: node.has_view(),
                })
            })
            .collect()
    }
}

/// Source-space recipe re-expressed for the render-space viewport camera.
pub fn render_space_recipe(recipe: ViewRecipe) -> ViewRecipe {
    match recipe {
        ViewRecipe::LookFrom { position, target } => ViewRecipe::LookFrom {
            position: to_render_space(position),
            target: to_render_space(target),
        },
        ViewRecipe::Orbit { target, radius } => ViewRecipe::Orbit {
            target: to_render_space(target),
            radius,
        },
    }
}

/// Render-space camera pose re-expressed in source space.
pub fn source_space_pose(pose: CameraPose) -> CameraPose {
    CameraPose {
        position: to_source_space(pose.position),
        target: to_source_space(pose.target),
    }
}

/// RPC notification for a tree event. `None` for copies of `annotation_added`
/// heard by anything but the root, so each attachment is reported once.
pub fn annotation_notification(
    event: &AnnotationEvent,
    root: AnnotationId,
) -> Option<(&'static str, serde_json::Value)> {
    use serde_json::json;
    let notification = match *event {
        AnnotationEvent::Added {
            listener,
            annotation,
        } => {
            if listener != root {
                return None;
            }
            ("annotation_added", json!({ "annotation": annotation.to_raw() }))
        }
        AnnotationEvent::Removed { annotation } => {
            ("annotation_removed", json!({ "annotation": annotation.to_raw() }))
        }
        AnnotationEvent::VisibilityChanged {
            annotation,
            visible,
        } => (
            "visibility_changed",
            json!({ "annotation": annotation.to_raw(), "visible": visible }),
        ),
        AnnotationEvent::Click { annotation } => {
            ("annotation_clicked", json!({ "annotation": annotation.to_raw() }))
        }
        AnnotationEvent::ActionTriggered { annotation, action } => (
            "annotation_action",
            json!({ "annotation": annotation.to_raw(), "action": action }),
        ),
        AnnotationEvent::FocusingStarted { annotation } => {
            ("focusing_started", json!({ "annotation": annotation.to_raw() }))
        }
        AnnotationEvent::FocusingFinished { annotation } => {
            ("focusing_finished", json!({ "annotation": annotation.to_raw() }))
        }
    };
    Some(notification)
}

#[derive(Event, Debug, Clone, Copy)]
pub struct StartInsertionEvent {
    pub options: InsertionOptions,
}

/// Global `cancel_insertions` broadcast.
#[derive(Event, Debug, Clone, Copy)]
pub struct CancelInsertionsEvent;

#[derive(Event, Debug, Clone, Copy)]
pub struct AnnotationClickEvent {
    pub annotation: AnnotationId,
}

/// The annotation tool is held exactly while an insertion runs.
fn release_annotation_tool(tool_manager: &mut ToolManager, rpc_interface: &mut WebRpcInterface) {
    if tool_manager.is_tool_active(ToolType::Annotation) {
        tool_manager.deactivate_current_tool();
        rpc_interface.send_notification(
            "tool_state_changed",
            serde_json::json!({
                "tool": "annotation",
                "active": false
            }),
        );
    }
}

pub fn handle_insertion_events(
    mut start_events: EventReader<StartInsertionEvent>,
    mut cancel_events: EventReader<CancelInsertionsEvent>,
    mut annotations: ResMut<AnnotationState>,
    mut tool_manager: ResMut<ToolManager>,
    mut measure_tool: ResMut<MeasureTool>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for _ in cancel_events.read() {
        if annotations.insertion.cancel_all() {
            info!("Annotation insertion cancelled");
            release_annotation_tool(&mut tool_manager, &mut rpc_interface);
        }
    }
    for event in start_events.read() {
        // Insertions started over RPC take the pointer from the measure tool.
        if tool_manager.activate_tool(ToolType::Annotation) {
            measure_tool.set_active(false);
            rpc_interface.send_notification(
                "tool_state_changed",
                serde_json::json!({
                    "tool": "annotation",
                    "active": true
                }),
            );
        }
        annotations.pending_position = None;
        annotations.insertion.start(event.options);
        info!("Annotation insertion started");
    }
}

/// Marker follows the cursor; left release places it and opens the dialog,
/// right release abandons it.
pub fn annotation_insertion_system(
    mut annotations: ResMut<AnnotationState>,
    mut tool_manager: ResMut<ToolManager>,
    picker: Res<ScenePicker>,
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    annotations.insertion.poll();
    if !annotations.insertion.is_active() {
        return;
    }

    if let (Ok(window), Ok((cam_xform, camera))) = (windows.single(), cameras.single()) {
        if let Some(pick) = window
            .cursor_position()
            .and_then(|cursor| picker.pick_cursor(camera, cam_xform, cursor))
        {
            annotations.insertion.drag_to(&pick);
        }
    }

    let button = if mouse.just_released(MouseButton::Left) {
        PointerButton::Left
    } else if mouse.just_released(MouseButton::Right) {
        PointerButton::Right
    } else {
        return;
    };

    match annotations.insertion.release(button) {
        InsertionOutcome::Placed(position) => {
            annotations.pending_position = Some(position);
            info!("Annotation marker placed at {:?}", position);
            rpc_interface.send_notification(
                "annotation_dialog_open",
                serde_json::json!({ "position": position.to_array() }),
            );
        }
        InsertionOutcome::Cancelled => debug!("Annotation insertion abandoned"),
        InsertionOutcome::Idle => return,
    }

    release_annotation_tool(&mut tool_manager, &mut rpc_interface);
}

/// Title clicks start a fly-to when the annotation is navigable.
pub fn handle_annotation_clicks(
    mut clicks: EventReader<AnnotationClickEvent>,
    mut annotations: ResMut<AnnotationState>,
    mut fly_requests: EventWriter<FlyToRequest>,
) {
    for click in clicks.read() {
        let annotation = click.annotation;
        match annotations.tree.click(annotation) {
            Ok(Some(recipe)) => {
                fly_requests.write(FlyToRequest {
                    recipe: render_space_recipe(recipe),
                    annotation: Some(annotation),
                });
                annotations
                    .tree
                    .events()
                    .publish(&AnnotationEvent::FocusingStarted { annotation });
            }
            Ok(None) => debug!("Annotation {:?} has no view", annotation),
            Err(e) => warn!("Ignoring click: {}", e),
        }
    }
}

pub fn finish_focusing(
    mut finished: EventReader<FlightFinished>,
    mut annotations: ResMut<AnnotationState>,
) {
    for flight in finished.read() {
        if let Some(annotation) = flight.annotation.filter(|id| annotations.tree.contains(*id)) {
            annotations
                .tree
                .events()
                .publish(&AnnotationEvent::FocusingFinished { annotation });
        }
    }
}

pub fn forward_annotation_events(
    annotations: Res<AnnotationState>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    let root = annotations.tree.root();
    for event in annotations.drain_events() {
        if let Some((method, params)) = annotation_notification(&event, root) {
            rpc_interface.send_notification(method, params);
        }
    }
}

/// Labels and insertion marker billboards for the current frame.
#[derive(Resource, Debug, Default)]
pub struct AnnotationLayoutFrame {
    pub labels: Vec<AnnotationLayout>,
    pub marker: Vec<Billboard>,
}

pub fn update_annotation_layout(
    mut annotations: ResMut<AnnotationState>,
    settings: Res<MeasureSettings>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Projection), With<Camera3d>>,
    mut frame: ResMut<AnnotationLayoutFrame>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut last_sent: Local<Option<serde_json::Value>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((cam_xform, projection)) = cameras.single() else {
        return;
    };
    let Some(projector) = source_space_projector(window, cam_xform, projection) else {
        return;
    };

    frame.labels = layout_annotations(&mut annotations.tree, &projector);
    frame.marker = annotations
        .insertion
        .active()
        .map(|insertion| projector.project_chain(insertion.marker.overlay(), &settings.sizes))
        .unwrap_or_default();

    let payload = serde_json::json!({
        "labels": frame.labels,
        "marker": frame.marker.iter().filter(|b| b.visible).collect::<Vec<_>>(),
    });
    if last_sent.as_ref() != Some(&payload) {
        rpc_interface.send_notification("annotation_labels", payload.clone());
        *last_sent = Some(payload);
    }
}

#[derive(Component)]
pub struct InsertionMarker;

pub fn render_insertion_marker(
    mut commands: Commands,
    frame: Res<AnnotationLayoutFrame>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<InsertionMarker>>,
) {
    for e in &existing {
        commands.entity(e).despawn();
    }

    for billboard in &frame.marker {
        if !matches!(billboard.anchor, AnchorKind::Vertex(_)) || billboard.scale <= 0.0 {
            continue;
        }
        let transform = Transform::from_translation(to_render_space(billboard.position))
            .with_scale(Vec3::splat(billboard.scale));
        commands.spawn((
            Mesh3d(meshes.add(Sphere::new(MARKER_SPHERE_RADIUS))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(1.0, 1.0, 0.2),
                emissive: LinearRgba::new(1., 1., 0.2, 1.),
                unlit: true,
                ..default()
            })),
            transform,
            GlobalTransform::from(transform),
            InsertionMarker,
            RenderLayers::layer(1),
        ));
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_labels::{AnnotationLabelButton, annotation_label_interaction, sync_annotation_labels};

/// Native builds draw annotation titles as UI buttons; the web frontend draws
/// its own from `annotation_labels`.
#[cfg(not(target_arch = "wasm32"))]
mod native_labels {
    use std::collections::HashMap;

    use bevy::prelude::*;
    use constants::render_settings::{
        LABEL_BACKGROUND_COLOUR, LABEL_BORDER_COLOUR, LABEL_TEXT_COLOUR,
    };

    use super::{AnnotationClickEvent, AnnotationLayoutFrame, AnnotationState};
    use crate::annotation::{AnnotationId, AnnotationLayout};

    /// One button per annotation, kept across frames.
    #[derive(Component)]
    pub struct AnnotationLabelButton {
        pub annotation: AnnotationId,
        title: Entity,
        description: Entity,
    }

    fn label_text(text: String, font_size: f32) -> impl Bundle {
        (
            Text::new(text),
            TextFont {
                font_size,
                ..default()
            },
            TextColor(LABEL_TEXT_COLOUR),
        )
    }

    fn spawn_label(commands: &mut Commands, label: &AnnotationLayout, description: Option<String>) {
        let annotation = AnnotationId::from_raw(label.id);
        let title = commands.spawn(label_text(label.title.clone(), 16.0)).id();
        let display = if description.is_some() {
            Display::Flex
        } else {
            Display::None
        };
        let description = commands
            .spawn((
                label_text(description.unwrap_or_default(), 13.0),
                Node {
                    display,
                    ..default()
                },
            ))
            .id();

        commands
            .spawn((
                AnnotationLabelButton {
                    annotation,
                    title,
                    description,
                },
                Button,
                BackgroundColor(LABEL_BACKGROUND_COLOUR),
                BorderColor(LABEL_BORDER_COLOUR),
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Px(label.screen.x.round()),
                    top: Val::Px(label.screen.y.round()),
                    flex_direction: FlexDirection::Column,
                    border: UiRect::all(Val::Px(1.0)),
                    padding: UiRect::axes(Val::Px(6.0), Val::Px(2.0)),
                    ..default()
                },
                ZIndex(-(label.distance as i32)),
            ))
            .add_children(&[title, description]);
    }

    pub fn sync_annotation_labels(
        mut commands: Commands,
        frame: Res<AnnotationLayoutFrame>,
        annotations: Res<AnnotationState>,
        mut buttons: Query<(Entity, &AnnotationLabelButton, &mut Node, &mut ZIndex)>,
        mut texts: Query<(&mut Text, &mut Node), Without<AnnotationLabelButton>>,
    ) {
        let description_of = |annotation: AnnotationId| {
            annotations
                .tree
                .get(annotation)
                .filter(|node| node.is_description_visible())
                .map(|node| node.description.clone())
        };

        let mut wanted: HashMap<AnnotationId, &AnnotationLayout> = frame
            .labels
            .iter()
            .map(|label| (AnnotationId::from_raw(label.id), label))
            .collect();

        for (entity, button, mut node, mut z_index) in &mut buttons {
            let Some(label) = wanted.remove(&button.annotation) else {
                commands.entity(entity).despawn();
                continue;
            };

            let (left, top) = (
                Val::Px(label.screen.x.round()),
                Val::Px(label.screen.y.round()),
            );
            if node.left != left || node.top != top {
                node.left = left;
                node.top = top;
            }
            let depth = -(label.distance as i32);
            if z_index.0 != depth {
                z_index.0 = depth;
            }

            if let Ok((mut title, _)) = texts.get_mut(button.title) {
                if title.0 != label.title {
                    title.0 = label.title.clone();
                }
            }
            if let Ok((mut text, mut text_node)) = texts.get_mut(button.description) {
                let description = description_of(button.annotation);
                let display = if description.is_some() {
                    Display::Flex
                } else {
                    Display::None
                };
                if text_node.display != display {
                    text_node.display = display;
                }
                if let Some(description) = description {
                    if text.0 != description {
                        text.0 = description;
                    }
                }
            }
        }

        for (annotation, label) in wanted {
            spawn_label(&mut commands, label, description_of(annotation));
        }
    }

    /// Hover highlights a label; a left press clicks it.
    pub fn annotation_label_interaction(
        labels: Query<(&Interaction, &AnnotationLabelButton)>,
        mouse: Res<ButtonInput<MouseButton>>,
        mut annotations: ResMut<AnnotationState>,
        mut clicks: EventWriter<AnnotationClickEvent>,
    ) {
        for (interaction, label) in &labels {
            let hovered = !matches!(interaction, Interaction::None);
            let _ = annotations.tree.set_highlighted(label.annotation, hovered);

            if *interaction == Interaction::Pressed && mouse.just_pressed(MouseButton::Left) {
                clicks.write(AnnotationClickEvent {
                    annotation: label.annotation,
                });
            }
        }
    }
}

pub struct AnnotationToolPlugin;

impl Plugin for AnnotationToolPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AnnotationState>()
            .init_resource::<AnnotationLayoutFrame>()
            .add_event::<StartInsertionEvent>()
            .add_event::<CancelInsertionsEvent>()
            .add_event::<AnnotationClickEvent>()
            .add_systems(
                Update,
                (
                    handle_insertion_events,
                    annotation_insertion_system,
                    handle_annotation_clicks,
                    finish_focusing,
                    forward_annotation_events,
                )
                    .chain(),
            )
            .add_systems(
                PostUpdate,
                (update_annotation_layout, render_insertion_marker)
                    .chain()
                    .after(bevy::transform::TransformSystem::TransformPropagate),
            );

        #[cfg(not(target_arch = "wasm32"))]
        app.add_systems(
            Update,
            annotation_label_interaction.before(handle_annotation_clicks),
        )
        .add_systems(
            PostUpdate,
            sync_annotation_labels.after(update_annotation_layout),
        );
    }
}

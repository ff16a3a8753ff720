use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy::window::PrimaryWindow;
use constants::coordinate_system::to_render_space;
use constants::render_settings::{DRAW_LINE_WIDTH, MARKER_GRAB_PIXEL_RADIUS, MARKER_SPHERE_RADIUS};
use serde::Serialize;

use crate::engine::camera::ScenePicker;
use crate::error::MeasureError;
use crate::events::{ANY_EVENT, NamedEvent};
use crate::measure::{AnchorKind, ChainConfig, ChainEvent, MeasurementChain};
use crate::projection::{OverlayProjector, OverlaySizes};
use crate::rpc::web_rpc::WebRpcInterface;
use crate::tools::overlay::{MeasureOverlayFrame, source_space_projector};

pub type ChainId = u32;

type ChainOutbox = Arc<Mutex<Vec<(ChainId, ChainEvent)>>>;

/// Defaults applied to chains started interactively or over RPC.
#[derive(Resource, Debug, Clone, Default)]
pub struct MeasureSettings {
    pub default_chain: ChainConfig,
    pub sizes: OverlaySizes,
}

/// Marker currently held by the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerDrag {
    pub chain: ChainId,
    pub index: usize,
}

/// Derived quantities of one chain, as reported to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSummary {
    pub chain: ChainId,
    pub name: String,
    pub closed: bool,
    pub points: Vec<[f32; 3]>,
    pub total_length: f32,
    pub area: f32,
    pub vertical_extent: f32,
    /// Interior angle per vertex, in degrees.
    pub angles: Vec<f32>,
    pub centroid: Option<[f32; 3]>,
}

impl ChainSummary {
    pub fn from_chain(chain_id: ChainId, chain: &MeasurementChain) -> Self {
        Self {
            chain: chain_id,
            name: chain.name().to_string(),
            closed: chain.config().closed,
            points: chain.positions().iter().map(|p| p.to_array()).collect(),
            total_length: chain.total_length(),
            area: chain.area(),
            vertical_extent: chain.vertical_extent(),
            angles: (0..chain.len())
                .map(|i| chain.interior_angle(i).to_degrees())
                .collect(),
            centroid: chain.centroid().map(|c| c.to_array()),
        }
    }
}

/// Every measurement chain in the scene plus interactive state.
#[derive(Resource, Default)]
pub struct MeasureTool {
    pub is_active: bool,
    chains: BTreeMap<ChainId, MeasurementChain>,
    /// Chain receiving clicks; a new one is started on the next click when unset.
    pub active_chain: Option<ChainId>,
    next_id: ChainId,
    pub drag: Option<MarkerDrag>,
    outbox: ChainOutbox,
}

impl MeasureTool {
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        if !active {
            self.active_chain = None;
            self.drag = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Create an empty chain and make it the click target.
    pub fn start_chain(&mut self, config: ChainConfig, name: Option<String>) -> ChainId {
        let id = self.next_id;
        self.next_id += 1;

        let mut chain = MeasurementChain::new(config)
            .with_name(name.unwrap_or_else(|| format!("Measurement #{}", id + 1)));
        let outbox = self.outbox.clone();
        chain.events().subscribe(ANY_EVENT, move |event: &ChainEvent| {
            if let Ok(mut queue) = outbox.lock() {
                queue.push((id, event.clone()));
            }
        });

        self.chains.insert(id, chain);
        self.active_chain = Some(id);
        id
    }

    pub fn chain(&self, id: ChainId) -> Option<&MeasurementChain> {
        self.chains.get(&id)
    }

    pub fn chain_mut(&mut self, id: ChainId) -> Option<&mut MeasurementChain> {
        self.chains.get_mut(&id)
    }

    pub fn chains(&self) -> impl Iterator<Item = (ChainId, &MeasurementChain)> {
        self.chains.iter().map(|(id, chain)| (*id, chain))
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn delete_chain(&mut self, id: ChainId) -> Option<MeasurementChain> {
        if self.active_chain == Some(id) {
            self.active_chain = None;
        }
        if self.drag.is_some_and(|drag| drag.chain == id) {
            self.drag = None;
        }
        self.chains.remove(&id)
    }

    /// Recompute every chain whose configuration changed. Returns how many did.
    pub fn refresh_all(&mut self) -> usize {
        self.chains
            .values_mut()
            .map(|chain| chain.refresh())
            .filter(|refreshed| *refreshed)
            .count()
    }

    pub fn summary(&self, id: ChainId) -> Option<ChainSummary> {
        self.chain(id).map(|chain| ChainSummary::from_chain(id, chain))
    }

    /// Take the chain notifications queued since the last call.
    pub fn drain_events(&self) -> Vec<(ChainId, ChainEvent)> {
        self.outbox
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }

    /// Marker whose screen position lies within `radius_px` of `cursor`, nearest first.
    pub fn marker_under_cursor(
        &self,
        projector: &OverlayProjector,
        cursor: Vec2,
        radius_px: f32,
    ) -> Option<MarkerDrag> {
        self.chains()
            .flat_map(|(chain_id, chain)| {
                chain
                    .points()
                    .iter()
                    .enumerate()
                    .filter_map(move |(index, point)| {
                        let screen = projector.world_to_screen(point.position)?;
                        Some((MarkerDrag { chain: chain_id, index }, screen.distance(cursor)))
                    })
            })
            .filter(|(_, distance)| *distance <= radius_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(drag, _)| drag)
    }
}

/// Payload sent to the frontend for a chain notification.
pub fn chain_event_payload(chain_id: ChainId, event: &ChainEvent) -> serde_json::Value {
    match event {
        ChainEvent::PointAdded { index, position }
        | ChainEvent::PointRemoved { index, position }
        | ChainEvent::PointMoved { index, position } => serde_json::json!({
            "chain": chain_id,
            "index": index,
            "position": position.to_array(),
        }),
        ChainEvent::PointDropped { index } => serde_json::json!({
            "chain": chain_id,
            "index": index,
        }),
    }
}

/// Left press grabs a marker or adds a point; drag follows the picked
/// surface; release drops the marker.
pub fn measure_tool_system(
    mut measure_tool: ResMut<MeasureTool>,
    settings: Res<MeasureSettings>,
    picker: Res<ScenePicker>,
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera, &Projection), With<Camera3d>>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    if !measure_tool.is_active() {
        return;
    }

    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((cam_xform, camera, projection)) = cameras.single() else {
        return;
    };

    let pick = picker.pick_cursor(camera, cam_xform, cursor);

    if let Some(drag) = measure_tool.drag {
        if mouse.just_released(MouseButton::Left) {
            if let Some(chain) = measure_tool.chain_mut(drag.chain) {
                let _ = chain.drop_point(drag.index);
            }
            measure_tool.drag = None;
        } else if let Some(pick) = pick {
            let moved = measure_tool
                .chain_mut(drag.chain)
                .map(|chain| chain.apply_pick(drag.index, &pick));
            match moved {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    warn!("Dropping stale marker drag: {}", e);
                    measure_tool.drag = None;
                }
                None => measure_tool.drag = None,
            }
        }
        return;
    }

    if !mouse.just_pressed(MouseButton::Left) {
        return;
    }

    let grabbed = source_space_projector(window, cam_xform, projection).and_then(|projector| {
        measure_tool.marker_under_cursor(&projector, cursor, MARKER_GRAB_PIXEL_RADIUS)
    });
    if let Some(drag) = grabbed {
        debug!("Grabbed marker {} of chain {}", drag.index, drag.chain);
        measure_tool.drag = Some(drag);
        return;
    }

    let Some(pick) = pick else {
        return;
    };
    let chain_id = match measure_tool.active_chain {
        Some(id) if measure_tool.chain(id).is_some() => id,
        _ => measure_tool.start_chain(settings.default_chain.clone(), None),
    };
    let Some(chain) = measure_tool.chain_mut(chain_id) else {
        return;
    };

    match chain.add_point(pick, None) {
        Ok(index) => debug!("Added point {} to chain {}", index, chain_id),
        Err(MeasureError::CapacityExceeded { max }) => {
            warn!("Chain {} is full ({} points)", chain_id, max);
            rpc_interface.send_notification(
                "measure_rejected",
                serde_json::json!({
                    "chain": chain_id,
                    "reason": "capacity_exceeded",
                    "max_points": max,
                }),
            );
        }
        Err(e) => warn!("Failed to add point: {}", e),
    }
}

/// Forward queued chain notifications to the frontend.
pub fn forward_measure_events(
    measure_tool: Res<MeasureTool>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for (chain_id, event) in measure_tool.drain_events() {
        rpc_interface.send_notification(event.name(), chain_event_payload(chain_id, &event));
    }
}

#[derive(Component)]
pub struct MeasureMarker;

fn overlay_material(colour: Color) -> StandardMaterial {
    StandardMaterial {
        base_color: colour,
        emissive: colour.to_linear(),
        unlit: true,
        ..default()
    }
}

/// Thin cuboid from `start` to `end` in render space.
pub fn segment_transform(start: Vec3, end: Vec3) -> Option<(Transform, f32)> {
    let dir = end - start;
    let dist = dir.length();
    if dist <= 0.02 {
        return None;
    }
    let midpoint = (start + end) * 0.5;
    let rot = Quat::from_rotation_arc(Vec3::X, dir.normalize());
    Some((Transform::from_translation(midpoint).with_rotation(rot), dist))
}

/// Clears previous marker meshes and rebuilds them from the overlay frame.
///
/// Runs after transform propagation, so spawned entities carry their
/// `GlobalTransform` explicitly.
pub fn update_measure_render(
    mut commands: Commands,
    measure_tool: Res<MeasureTool>,
    frame: Res<MeasureOverlayFrame>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<MeasureMarker>>,
) {
    for e in &existing {
        commands.entity(e).despawn();
    }

    for projected in &frame.chains {
        let Some(chain) = measure_tool.chain(projected.chain) else {
            continue;
        };
        let material = materials.add(overlay_material(projected.colour));
        let mut spawn_segment = |commands: &mut Commands, start: Vec3, end: Vec3| {
            if let Some((transform, dist)) =
                segment_transform(to_render_space(start), to_render_space(end))
            {
                commands.spawn((
                    Mesh3d(meshes.add(Cuboid::new(dist, DRAW_LINE_WIDTH, DRAW_LINE_WIDTH))),
                    MeshMaterial3d(material.clone()),
                    transform,
                    GlobalTransform::from(transform),
                    MeasureMarker,
                    RenderLayers::layer(1),
                ));
            }
        };

        let overlay = chain.overlay();
        for edge in overlay.edges.iter().filter(|edge| edge.visible) {
            spawn_segment(&mut commands, edge.start, edge.end);
        }
        if let Some(height) = overlay.height.as_ref().filter(|h| h.visible) {
            for pair in height.profile.polyline().windows(2) {
                spawn_segment(&mut commands, pair[0], pair[1]);
            }
        }

        let sphere = meshes.add(Sphere::new(MARKER_SPHERE_RADIUS));
        for billboard in &projected.billboards {
            if !matches!(billboard.anchor, AnchorKind::Vertex(_)) || !billboard.visible {
                continue;
            }
            let scale = if billboard.scale > 0.0 { billboard.scale } else { 1.0 };
            let transform = Transform::from_translation(to_render_space(billboard.position))
                .with_scale(Vec3::splat(scale));
            commands.spawn((
                Mesh3d(sphere.clone()),
                MeshMaterial3d(material.clone()),
                transform,
                GlobalTransform::from(transform),
                MeasureMarker,
                RenderLayers::layer(1),
            ));
        }
    }
}

pub struct MeasureToolPlugin;

impl Plugin for MeasureToolPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MeasureTool>()
            .init_resource::<MeasureSettings>()
            .add_systems(Update, (measure_tool_system, forward_measure_events).chain());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{OverlayCamera, Viewport};
    use std::f32::consts::FRAC_PI_2;

    fn projector() -> OverlayProjector {
        let camera = OverlayCamera::perspective(
            Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)),
            FRAC_PI_2,
            800.0 / 600.0,
            0.1,
        );
        OverlayProjector::new(camera, Viewport::new(800.0, 600.0))
    }

    #[test]
    fn chains_forward_their_events_with_ids() {
        let mut tool = MeasureTool::default();
        let first = tool.start_chain(ChainConfig::default(), None);
        let second = tool.start_chain(ChainConfig::default(), Some("kerb".into()));
        assert_eq!(tool.active_chain, Some(second));
        assert_eq!(tool.chain(second).unwrap().name(), "kerb");

        tool.chain_mut(first).unwrap().add_point(Vec3::ZERO, None).unwrap();
        tool.chain_mut(second).unwrap().add_point(Vec3::X, None).unwrap();
        tool.chain_mut(second).unwrap().drop_point(0).unwrap();

        let events = tool.drain_events();
        let names: Vec<_> = events.iter().map(|(id, e)| (*id, e.name())).collect();
        assert_eq!(
            names,
            vec![
                (first, "marker_added"),
                (second, "marker_added"),
                (second, "marker_dropped")
            ]
        );
        assert!(tool.drain_events().is_empty());
    }

    #[test]
    fn deleting_the_active_chain_clears_interaction_state() {
        let mut tool = MeasureTool::default();
        let id = tool.start_chain(ChainConfig::default(), None);
        tool.drag = Some(MarkerDrag { chain: id, index: 0 });

        assert!(tool.delete_chain(id).is_some());
        assert!(tool.active_chain.is_none());
        assert!(tool.drag.is_none());
        assert!(tool.delete_chain(id).is_none());
    }

    #[test]
    fn summary_reports_derived_quantities() {
        let mut tool = MeasureTool::default();
        let id = tool.start_chain(ChainConfig::default(), None);
        let chain = tool.chain_mut(id).unwrap();
        for p in [Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.0, 4.0, 2.0)] {
            chain.add_point(p, None).unwrap();
        }

        let summary = tool.summary(id).unwrap();
        assert_eq!(summary.points.len(), 3);
        assert!((summary.total_length - (3.0 + 20f32.sqrt() + 29f32.sqrt())).abs() < 1e-4);
        assert_eq!(summary.area, 6.0);
        assert_eq!(summary.vertical_extent, 2.0);
        assert_eq!(summary.angles.len(), 3);
        assert!(tool.summary(id + 1).is_none());
    }

    #[test]
    fn grab_picks_the_nearest_marker_in_reach() {
        let mut tool = MeasureTool::default();
        let id = tool.start_chain(ChainConfig::default(), None);
        let chain = tool.chain_mut(id).unwrap();
        chain.add_point(Vec3::ZERO, None).unwrap();
        chain.add_point(Vec3::new(0.05, 0.0, 0.0), None).unwrap();
        chain.add_point(Vec3::new(5.0, 0.0, 0.0), None).unwrap();

        let projector = projector();
        let centre = projector.world_to_screen(Vec3::ZERO).unwrap();

        let grabbed = tool.marker_under_cursor(&projector, centre, MARKER_GRAB_PIXEL_RADIUS);
        assert_eq!(grabbed, Some(MarkerDrag { chain: id, index: 0 }));

        let far = centre + Vec2::new(0.0, 200.0);
        assert!(tool.marker_under_cursor(&projector, far, MARKER_GRAB_PIXEL_RADIUS).is_none());
    }

    #[test]
    fn payload_carries_copied_position() {
        let payload = chain_event_payload(
            4,
            &ChainEvent::PointMoved {
                index: 2,
                position: Vec3::new(1.0, 2.0, 3.0),
            },
        );
        assert_eq!(payload["chain"], 4);
        assert_eq!(payload["index"], 2);
        assert_eq!(payload["position"], serde_json::json!([1.0, 2.0, 3.0]));
        assert!(
            chain_event_payload(0, &ChainEvent::PointDropped { index: 1 })
                .get("position")
                .is_none()
        );
    }

    #[test]
    fn segments_shorter_than_the_cutoff_are_skipped() {
        assert!(segment_transform(Vec3::ZERO, Vec3::new(0.01, 0.0, 0.0)).is_none());
        let (transform, dist) = segment_transform(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        assert_eq!(dist, 2.0);
        assert_eq!(transform.translation, Vec3::new(0.0, 1.0, 0.0));
    }
}

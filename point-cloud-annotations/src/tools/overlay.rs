//! Per-frame overlay projection.
//!
//! Runs once per frame in `PostUpdate` after transform propagation, so the
//! camera transform is final for the frame being drawn. Chains are projected
//! in point-cloud source space; billboard scales carry over to render space
//! unchanged because the frame change is a rotation.

use bevy::prelude::*;
use bevy::transform::TransformSystem;
use bevy::window::PrimaryWindow;
use constants::coordinate_system::source_from_render_affine;
use serde::Serialize;

use crate::measure::AnchorKind;
use crate::projection::{Billboard, OverlayCamera, OverlayProjector, Viewport};
use crate::rpc::web_rpc::WebRpcInterface;
use crate::tools::measure::{ChainId, MeasureSettings, MeasureTool, update_measure_render};

/// Projector for the active camera, expressed in source space.
pub fn source_space_projector(
    window: &Window,
    camera_transform: &GlobalTransform,
    projection: &Projection,
) -> Option<OverlayProjector> {
    let viewport = Viewport::new(window.width(), window.height());
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return None;
    }
    let camera = OverlayCamera::from_bevy(camera_transform, projection)?
        .in_frame(source_from_render_affine());
    Some(OverlayProjector::new(camera, viewport))
}

#[derive(Debug, Clone)]
pub struct ChainBillboards {
    pub chain: ChainId,
    pub colour: Color,
    pub billboards: Vec<Billboard>,
}

/// Billboards of every chain for the current frame.
#[derive(Resource, Debug, Default)]
pub struct MeasureOverlayFrame {
    pub chains: Vec<ChainBillboards>,
}

#[derive(Debug, Serialize)]
struct ScreenLabel<'a> {
    anchor: &'a AnchorKind,
    text: &'a str,
    screen: [f32; 2],
}

/// Visible, on-screen labels of a frame, grouped per chain.
pub fn label_payload(frame: &MeasureOverlayFrame) -> serde_json::Value {
    let chains: Vec<serde_json::Value> = frame
        .chains
        .iter()
        .map(|projected| {
            let labels: Vec<ScreenLabel> = projected
                .billboards
                .iter()
                .filter(|b| b.visible && b.anchor.is_label())
                .filter_map(|b| {
                    Some(ScreenLabel {
                        anchor: &b.anchor,
                        text: b.text.as_deref()?,
                        screen: b.screen?.round().to_array(),
                    })
                })
                .collect();
            serde_json::json!({
                "chain": projected.chain,
                "labels": labels,
            })
        })
        .collect();
    serde_json::json!({ "chains": chains })
}

pub fn update_measure_overlays(
    mut measure_tool: ResMut<MeasureTool>,
    settings: Res<MeasureSettings>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Projection), With<Camera3d>>,
    mut frame: ResMut<MeasureOverlayFrame>,
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

    let refreshed = measure_tool.refresh_all();
    if refreshed > 0 {
        debug!("Recomputed {} reconfigured chains", refreshed);
    }

    frame.chains = measure_tool
        .chains()
        .map(|(chain_id, chain)| ChainBillboards {
            chain: chain_id,
            colour: chain.config().colour,
            billboards: projector.project_chain(chain.overlay(), &settings.sizes),
        })
        .collect();

    let payload = label_payload(&frame);
    if last_sent.as_ref() != Some(&payload) {
        rpc_interface.send_notification("measure_labels", payload.clone());
        *last_sent = Some(payload);
    }
}

/// Projects chains, then redraws their geometry and labels.
pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MeasureOverlayFrame>().add_systems(
            PostUpdate,
            (update_measure_overlays, update_measure_render)
                .chain()
                .after(TransformSystem::TransformPropagate),
        );

        #[cfg(not(target_arch = "wasm32"))]
        app.add_systems(PostUpdate, sync_overlay_labels.after(update_measure_render));
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_labels::{OverlayLabelText, sync_overlay_labels};

/// Native builds draw labels with Bevy UI; the web frontend draws its own.
///
/// Label entities persist per chain anchor and are edited in place, so the UI
/// layout pass sizes them before they are drawn.
#[cfg(not(target_arch = "wasm32"))]
mod native_labels {
    use std::collections::HashMap;

    use bevy::prelude::*;
    use constants::render_settings::{
        LABEL_BACKGROUND_COLOUR, LABEL_BORDER_COLOUR, LABEL_TEXT_COLOUR,
    };

    use super::MeasureOverlayFrame;
    use crate::measure::AnchorKind;
    use crate::tools::measure::ChainId;

    #[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OverlayLabelText {
        pub chain: ChainId,
        pub anchor: AnchorKind,
    }

    pub fn sync_overlay_labels(
        mut commands: Commands,
        frame: Res<MeasureOverlayFrame>,
        mut existing: Query<(Entity, &OverlayLabelText, &mut Node, &mut Text)>,
    ) {
        let mut wanted: HashMap<OverlayLabelText, (&str, Vec2)> = HashMap::new();
        for projected in &frame.chains {
            for billboard in &projected.billboards {
                if !billboard.visible || !billboard.anchor.is_label() {
                    continue;
                }
                let (Some(text), Some(screen)) = (billboard.text.as_deref(), billboard.screen)
                else {
                    continue;
                };
                let key = OverlayLabelText {
                    chain: projected.chain,
                    anchor: billboard.anchor,
                };
                wanted.insert(key, (text, screen.round()));
            }
        }

        for (entity, key, mut node, mut label) in &mut existing {
            let Some((text, screen)) = wanted.remove(key) else {
                commands.entity(entity).despawn();
                continue;
            };
            let (left, top) = (Val::Px(screen.x), Val::Px(screen.y));
            if node.left != left || node.top != top {
                node.left = left;
                node.top = top;
            }
            if label.0 != text {
                label.0 = text.to_string();
            }
        }

        for (key, (text, screen)) in wanted {
            commands.spawn((
                Text::new(text),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(LABEL_TEXT_COLOUR),
                BackgroundColor(LABEL_BACKGROUND_COLOUR),
                BorderColor(LABEL_BORDER_COLOUR),
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Px(screen.x),
                    top: Val::Px(screen.y),
                    border: UiRect::all(Val::Px(1.0)),
                    padding: UiRect::axes(Val::Px(4.0), Val::Px(1.0)),
                    ..default()
                },
                key,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn billboard(anchor: AnchorKind, text: Option<&str>, screen: Option<Vec2>) -> Billboard {
        Billboard {
            anchor,
            position: Vec3::ZERO,
            scale: 1.0,
            screen,
            visible: true,
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn payload_lists_only_visible_on_screen_labels() {
        let mut hidden = billboard(AnchorKind::AreaLabel, Some("2.0 m²"), Some(Vec2::ONE));
        hidden.visible = false;
        let frame = MeasureOverlayFrame {
            chains: vec![ChainBillboards {
                chain: 3,
                colour: Color::WHITE,
                billboards: vec![
                    billboard(AnchorKind::Vertex(0), None, Some(Vec2::ZERO)),
                    billboard(AnchorKind::EdgeLabel(0), Some("1.00 m"), Some(Vec2::new(10.4, 20.6))),
                    billboard(AnchorKind::EdgeLabel(1), Some("2.00 m"), None),
                    hidden,
                ],
            }],
        };

        let payload = label_payload(&frame);
        let labels = payload["chains"][0]["labels"].as_array().unwrap();
        assert_eq!(payload["chains"][0]["chain"], 3);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0]["text"], "1.00 m");
        assert_eq!(labels[0]["screen"], serde_json::json!([10.0, 21.0]));
        assert_eq!(labels[0]["anchor"]["kind"], "edge_label");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn native_labels_are_edited_in_place() {
        let mut app = App::new();
        app.init_resource::<MeasureOverlayFrame>()
            .add_systems(Update, sync_overlay_labels);

        let place = |app: &mut App, billboards: Vec<Billboard>| {
            app.world_mut().resource_mut::<MeasureOverlayFrame>().chains = vec![ChainBillboards {
                chain: 1,
                colour: Color::WHITE,
                billboards,
            }];
            app.update();
        };
        let labels = |app: &mut App| {
            let mut query = app
                .world_mut()
                .query::<(Entity, &OverlayLabelText, &Node, &Text)>();
            query
                .iter(app.world())
                .map(|(e, key, node, text)| (e, key.anchor, node.left, text.0.clone()))
                .collect::<Vec<_>>()
        };

        place(
            &mut app,
            vec![billboard(AnchorKind::EdgeLabel(0), Some("1.00 m"), Some(Vec2::new(10.0, 5.0)))],
        );
        let first = labels(&mut app);
        assert_eq!(first.len(), 1);

        place(
            &mut app,
            vec![billboard(AnchorKind::EdgeLabel(0), Some("1.50 m"), Some(Vec2::new(40.0, 5.0)))],
        );
        let second = labels(&mut app);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0, first[0].0);
        assert_eq!(second[0].2, Val::Px(40.0));
        assert_eq!(second[0].3, "1.50 m");

        place(
            &mut app,
            vec![billboard(AnchorKind::AreaLabel, Some("2.0 m²"), Some(Vec2::ZERO))],
        );
        let third = labels(&mut app);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].1, AnchorKind::AreaLabel);
        assert_ne!(third[0].0, first[0].0);
    }
}

use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy_common_assets::json::JsonAssetPlugin;
use constants::path::ANNOTATION_SCENE_EXTENSION;

// Crate engine modules
use crate::engine::camera::fly_to::{advance_camera_flight, start_camera_flights};
use crate::engine::camera::{
    CameraFlight, FlightFinished, FlyToRequest, ScenePicker, ViewportCamera, camera_controller,
};
use crate::engine::core::window_config::create_window_config;
// Annotation scene loading
use crate::annotation::AnnotationSceneFile;
use crate::annotation::AnnotationSceneLoader;
use crate::annotation::scene_file::{instantiate_annotation_scene, start_annotation_loading};
// Crate tools modules
use crate::tools::{
    annotation::AnnotationToolPlugin, measure::MeasureToolPlugin, overlay::OverlayPlugin,
    tool_manager::ToolManagerPlugin,
};
// Create Web RPC modules
use crate::rpc::web_rpc::WebRpcPlugin;

pub fn create_app() -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        // Registers annotation scene files as a loadable asset type.
        .add_plugins(JsonAssetPlugin::<AnnotationSceneFile>::new(&[
            ANNOTATION_SCENE_EXTENSION,
        ]))
        .add_plugins(WebRpcPlugin);

    app.add_plugins(ToolManagerPlugin)
        .add_plugins(MeasureToolPlugin)
        .add_plugins(OverlayPlugin)
        .add_plugins(AnnotationToolPlugin);

    // Initialise resources early
    app.init_resource::<ViewportCamera>()
        .init_resource::<CameraFlight>()
        .init_resource::<ScenePicker>()
        .init_resource::<AnnotationSceneLoader>()
        .add_event::<FlyToRequest>()
        .add_event::<FlightFinished>();

    app.add_systems(Startup, (setup, start_annotation_loading).chain())
        .add_systems(
            Update,
            (
                instantiate_annotation_scene,
                start_camera_flights,
                advance_camera_flight,
                camera_controller,
            )
                .chain(),
        );

    app
}

fn spawn_lighting(commands: &mut Commands) {
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            EulerRot::ZYX,
            0.0,
            1.0,
            -std::f32::consts::FRAC_PI_4,
        )),
    ));
}

/// Overlay meshes live on layer 1 so the camera must render both layers.
fn spawn_viewport_camera(commands: &mut Commands, viewport_camera: &ViewportCamera) {
    commands.spawn((
        Camera3d::default(),
        viewport_camera.transform(),
        RenderLayers::default().with(1),
    ));
}

/// Stand-in surface matching the default ground-plane picker.
fn spawn_ground(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(200.0, 200.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.32, 0.33, 0.35),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::IDENTITY,
    ));
}

// Startup system that only handles basic initialisation
fn setup(
    mut commands: Commands,
    viewport_camera: Res<ViewportCamera>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    spawn_lighting(&mut commands);
    spawn_viewport_camera(&mut commands, &viewport_camera);
    spawn_ground(&mut commands, &mut meshes, &mut materials);
    info!("Viewer initialised");
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

use bevy::input::mouse::MouseScrollUnit;
use bevy::math::EulerRot;
use bevy::{
    input::mouse::{MouseMotion, MouseWheel},
    prelude::*,
};

use super::fly_to::CameraPose;

/// Free-fly viewport camera in render space (Y up).
///
/// `focus_point` is the eye position the camera transform eases towards;
/// `radius` is the distance to the pivot the camera orbits and flies around.
#[derive(Resource)]
pub struct ViewportCamera {
    pub focus_point: Vec3,
    pub height: f32,
    pub radius: f32,
    pub last_mouse_pos: Vec2,
    pub ground_height: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl ViewportCamera {
    pub fn new(center: Vec3, ground_height: f32) -> Self {
        let size = Vec3::new(100.0, 50.0, 100.0);
        Self {
            focus_point: center,
            height: size.length() * 0.8,
            radius: size.length() * 0.2,
            last_mouse_pos: Vec2::ZERO,
            ground_height,
            pitch: -0.6,
            yaw: 0.0,
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Unit view direction (the camera looks down its local -Z).
    pub fn direction(&self) -> Vec3 {
        (self.rotation() * Vec3::NEG_Z).normalize()
    }

    /// Point the camera orbits around, `radius` ahead of the eye.
    pub fn pivot(&self) -> Vec3 {
        self.focus_point + self.direction() * self.radius
    }

    /// Turn towards `target` without moving the eye.
    pub fn look_at(&mut self, target: Vec3) {
        let direction = (target - self.focus_point).normalize_or_zero();
        if direction == Vec3::ZERO {
            return;
        }
        self.pitch = direction.y.clamp(-1.0, 1.0).asin().clamp(-1.55, 1.55);
        self.yaw = (-direction.x).atan2(-direction.z);
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.focus_point,
            target: self.pivot(),
        }
    }

    pub fn apply_pose(&mut self, pose: &CameraPose) {
        self.focus_point = pose.position;
        let distance = pose.position.distance(pose.target);
        if distance > f32::EPSILON {
            self.radius = distance;
            self.look_at(pose.target);
        }
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.focus_point).with_rotation(self.rotation())
    }
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self {
            focus_point: Vec3::new(0.0, 30.0, 60.0),
            height: 100.0,
            radius: 60.0,
            last_mouse_pos: Vec2::ZERO,
            ground_height: 0.0,
            pitch: -0.6,
            yaw: 0.0,
        }
    }
}

pub fn camera_controller(
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    mut viewport: ResMut<ViewportCamera>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    mut cursor_moved: EventReader<CursorMoved>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    for cursor in cursor_moved.read() {
        viewport.last_mouse_pos = cursor.position;
    }

    let mouse_delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();

    // Right drag looks around
    if mouse_button.pressed(MouseButton::Right) && mouse_delta != Vec2::ZERO {
        let yaw_sens = 0.0035;
        let pitch_sens = 0.0030;
        viewport.yaw += -mouse_delta.x * yaw_sens;
        viewport.pitch += -mouse_delta.y * pitch_sens;
        viewport.pitch = viewport.pitch.clamp(-1.55, 1.55);
    }

    let mut scroll_accum = 0.0;
    for ev in scroll_events.read() {
        scroll_accum += match ev.unit {
            MouseScrollUnit::Line => ev.y * 1.0,
            MouseScrollUnit::Pixel => ev.y * 0.05,
        };
    }

    // Dolly along the view direction
    if scroll_accum.abs() > f32::EPSILON {
        let dolly_speed = (viewport.height * 0.2).clamp(0.5, 500.0);
        let forward = viewport.direction();
        viewport.focus_point += forward * (scroll_accum * dolly_speed);
    }

    let mut move_input = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        move_input.z -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        move_input.z += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        move_input.x += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        move_input.x -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyE) {
        move_input.y += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyQ) {
        move_input.y -= 1.0;
    }

    if move_input != Vec3::ZERO {
        let view_rot = viewport.rotation();
        let forward = (view_rot * Vec3::Z).normalize();
        let right = (view_rot * Vec3::X).normalize();
        let up = Vec3::Y;

        // Shift = faster, ctrl = slower
        let mut speed = viewport.height.clamp(2.0, 200.0);
        if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
            speed *= 3.5;
        }
        if keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]) {
            speed *= 0.25;
        }

        let world_delta = right * move_input.x + up * move_input.y + forward * move_input.z;
        viewport.focus_point += world_delta.normalize() * speed * time.delta_secs();
    }

    let target_rot = viewport.rotation();
    let target_pos = viewport.focus_point;

    let lerp_speed = 12.0 * time.delta_secs();
    camera_transform.translation = camera_transform
        .translation
        .lerp(target_pos, lerp_speed.min(1.0));
    camera_transform.rotation = camera_transform
        .rotation
        .slerp(target_rot, lerp_speed.min(1.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn look_at_points_the_view_direction() {
        let mut camera = ViewportCamera::default();
        camera.focus_point = Vec3::new(0.0, 10.0, 10.0);
        camera.look_at(Vec3::new(5.0, 0.0, 0.0));

        let expected = (Vec3::new(5.0, 0.0, 0.0) - camera.focus_point).normalize();
        let direction = camera.direction();
        assert_relative_eq!(direction.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(direction.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(direction.z, expected.z, epsilon = 1e-5);
    }

    #[test]
    fn pose_round_trip() {
        let mut camera = ViewportCamera::default();
        let pose = CameraPose {
            position: Vec3::new(3.0, 4.0, 5.0),
            target: Vec3::new(3.0, 0.0, -2.0),
        };
        camera.apply_pose(&pose);
        let back = camera.pose();
        assert_relative_eq!(back.position.distance(pose.position), 0.0, epsilon = 1e-5);
        assert_relative_eq!(back.target.distance(pose.target), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn default_looks_forward_and_down() {
        let camera = ViewportCamera::default();
        let direction = camera.direction();
        assert!(direction.z < 0.0 && direction.y < 0.0);
        assert_eq!(camera.transform().translation, camera.focus_point);
    }
}

use bevy::prelude::*;
use bevy::render::camera::CameraProjection;

/// Projection family of the active camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    /// Vertical field of view in radians.
    Perspective { fov: f32 },
    Orthographic,
}

/// Viewport size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Camera state the overlay projector needs, decoupled from any engine type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayCamera {
    pub world_from_view: Mat4,
    pub clip_from_view: Mat4,
    pub mode: ProjectionMode,
}

impl OverlayCamera {
    /// Reverse-Z infinite perspective, matching Bevy's `PerspectiveProjection`.
    pub fn perspective(world_from_view: Mat4, fov: f32, aspect_ratio: f32, near: f32) -> Self {
        Self {
            world_from_view,
            clip_from_view: Mat4::perspective_infinite_reverse_rh(fov, aspect_ratio, near),
            mode: ProjectionMode::Perspective { fov },
        }
    }

    pub fn orthographic(world_from_view: Mat4, clip_from_view: Mat4) -> Self {
        Self {
            world_from_view,
            clip_from_view,
            mode: ProjectionMode::Orthographic,
        }
    }

    /// Build from a Bevy camera, taking the clip matrix Bevy renders with.
    /// Custom projections are not supported.
    pub fn from_bevy(transform: &GlobalTransform, projection: &Projection) -> Option<Self> {
        let mode = match projection {
            Projection::Perspective(p) => ProjectionMode::Perspective { fov: p.fov },
            Projection::Orthographic(_) => ProjectionMode::Orthographic,
            #[allow(unreachable_patterns)]
            _ => return None,
        };
        Some(Self {
            world_from_view: transform.compute_matrix(),
            clip_from_view: projection.get_clip_from_view(),
            mode,
        })
    }

    /// Re-express the camera in another frame, e.g. point-cloud source space.
    pub fn in_frame(&self, frame_from_world: Mat4) -> Self {
        Self {
            world_from_view: frame_from_world * self.world_from_view,
            ..*self
        }
    }

    pub fn position(&self) -> Vec3 {
        self.world_from_view.w_axis.truncate()
    }

    /// Unit view direction (the camera looks down its local -Z).
    pub fn direction(&self) -> Vec3 {
        (-self.world_from_view.z_axis.truncate()).normalize_or_zero()
    }

    pub fn clip_from_world(&self) -> Mat4 {
        self.clip_from_view * self.world_from_view.inverse()
    }

    pub fn is_perspective(&self) -> bool {
        matches!(self.mode, ProjectionMode::Perspective { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn position_and_direction_from_transform() {
        let transform = Transform::from_xyz(0.0, 0.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y);
        let camera = OverlayCamera::perspective(transform.compute_matrix(), 1.0, 1.0, 0.1);
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 10.0));
        assert_relative_eq!(camera.direction().z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn frame_change_moves_the_eye() {
        let transform = Transform::from_xyz(0.0, 5.0, 0.0);
        let camera = OverlayCamera::perspective(transform.compute_matrix(), 1.0, 1.0, 0.1);
        let rotated = camera.in_frame(Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        assert_relative_eq!(rotated.position().z, -5.0, epsilon = 1e-5);
        assert!(rotated.is_perspective());
    }

    #[test]
    fn bevy_orthographic_is_recognised() {
        let projection = Projection::Orthographic(OrthographicProjection::default_3d());
        let camera = OverlayCamera::from_bevy(&GlobalTransform::IDENTITY, &projection).unwrap();
        assert_eq!(camera.mode, ProjectionMode::Orthographic);

        // Reverse-Z: points between the planes land inside (0, 1).
        let ndc = camera.clip_from_world().project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert_relative_eq!(ndc.x, 0.0);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn bevy_perspective_matches_the_reverse_z_constructor() {
        let perspective = PerspectiveProjection {
            fov: 0.8,
            aspect_ratio: 1.5,
            near: 0.2,
            ..default()
        };
        let transform = Transform::from_xyz(1.0, 2.0, 3.0).looking_at(Vec3::ZERO, Vec3::Y);
        let from_bevy = OverlayCamera::from_bevy(
            &GlobalTransform::from(transform),
            &Projection::Perspective(perspective),
        )
        .unwrap();
        let by_hand = OverlayCamera::perspective(transform.compute_matrix(), 0.8, 1.5, 0.2);

        assert_eq!(from_bevy.mode, by_hand.mode);
        assert!(from_bevy
            .clip_from_view
            .abs_diff_eq(by_hand.clip_from_view, 1e-6));
        assert!(from_bevy
            .world_from_view
            .abs_diff_eq(by_hand.world_from_view, 1e-5));
    }
}

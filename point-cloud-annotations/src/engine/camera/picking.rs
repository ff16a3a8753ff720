use bevy::prelude::*;
use constants::coordinate_system::to_source_space;
use serde_json::json;

use crate::measure::PickResult;

/// Resolves a render-space view ray to a surface point.
///
/// Implementations return positions in source space, ready for a
/// measurement chain or annotation.
pub trait PointPicker: Send + Sync {
    fn pick(&self, ray: &Ray3d) -> Option<PickResult>;
}

/// Intersects rays with the horizontal plane `y = ground_height`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundPlanePicker {
    pub ground_height: f32,
}

impl GroundPlanePicker {
    pub fn intersect(&self, ray: &Ray3d) -> Option<Vec3> {
        if ray.direction.y.abs() < 0.001 {
            return None;
        }
        let t = (self.ground_height - ray.origin.y) / ray.direction.y;
        if t > 0.0 {
            Some(ray.origin + ray.direction * t)
        } else {
            None
        }
    }
}

impl PointPicker for GroundPlanePicker {
    fn pick(&self, ray: &Ray3d) -> Option<PickResult> {
        let hit = self.intersect(ray)?;
        let mut result = PickResult {
            position: to_source_space(hit),
            ..default()
        };
        result
            .attributes
            .insert("normal".to_string(), json!([0.0, 0.0, 1.0]));
        Some(result)
    }
}

/// Picker used by the interactive tools.
#[derive(Resource)]
pub struct ScenePicker {
    pub picker: Box<dyn PointPicker>,
}

impl Default for ScenePicker {
    fn default() -> Self {
        Self {
            picker: Box::new(GroundPlanePicker::default()),
        }
    }
}

impl ScenePicker {
    /// Pick under `cursor` (window pixels) through `camera`.
    pub fn pick_cursor(
        &self,
        camera: &Camera,
        camera_transform: &GlobalTransform,
        cursor: Vec2,
    ) -> Option<PickResult> {
        let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;
        self.picker.pick(&ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_hit_is_returned_in_source_space() {
        let picker = GroundPlanePicker { ground_height: 2.0 };
        let ray = Ray3d::new(Vec3::new(3.0, 10.0, -4.0), Dir3::NEG_Y);

        let hit = picker.pick(&ray).unwrap();

        // Render (x, y, z) maps back to source (x, -z, y).
        assert_eq!(hit.position, Vec3::new(3.0, 4.0, 2.0));
        assert_eq!(hit.attributes["normal"], json!([0.0, 0.0, 1.0]));
    }

    #[test]
    fn rays_away_from_the_plane_miss() {
        let picker = GroundPlanePicker::default();
        assert!(picker.intersect(&Ray3d::new(Vec3::Y, Dir3::Y)).is_none());
        assert!(picker.intersect(&Ray3d::new(Vec3::Y, Dir3::X)).is_none());
    }
}

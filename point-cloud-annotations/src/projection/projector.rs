use bevy::prelude::*;
use constants::render_settings::{
    COORDINATE_LABEL_PIXEL_OFFSET, LABEL_PIXEL_SIZE, MARKER_PIXEL_SIZE,
};
use serde::Serialize;

use super::camera::{OverlayCamera, ProjectionMode, Viewport};
use crate::measure::overlay::{AnchorKind, ChainOverlay};

/// Desired on-screen sizes for the elements of a chain overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySizes {
    pub marker_px: f32,
    pub label_px: f32,
    pub coordinate_offset_px: f32,
}

impl Default for OverlaySizes {
    fn default() -> Self {
        Self {
            marker_px: MARKER_PIXEL_SIZE,
            label_px: LABEL_PIXEL_SIZE,
            coordinate_offset_px: COORDINATE_LABEL_PIXEL_OFFSET,
        }
    }
}

/// Screen-stable transform for one anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Billboard {
    pub anchor: AnchorKind,
    /// World position the element is drawn at (label offsets applied).
    pub position: Vec3,
    /// Uniform scale keeping the element at its desired pixel size.
    pub scale: f32,
    /// Pixel position, origin top-left. `None` behind a perspective camera.
    pub screen: Option<Vec2>,
    pub visible: bool,
    pub text: Option<String>,
}

/// Pixel size of a sphere of `radius` at `distance` under a perspective camera.
pub fn projected_radius_perspective(
    radius: f32,
    fov: f32,
    distance: f32,
    screen_height: f32,
) -> f32 {
    let projection_factor = (1.0 / (fov / 2.0).tan()) / distance;
    radius * projection_factor * screen_height / 2.0
}

/// Pixel distance between the projections of the view origin and
/// `(radius, 0, 0)` through an orthographic matrix.
pub fn projected_radius_orthographic(radius: f32, clip_from_view: &Mat4, viewport: Viewport) -> f32 {
    let origin = *clip_from_view * Vec4::new(0.0, 0.0, 0.0, 1.0);
    let offset = *clip_from_view * Vec4::new(radius, 0.0, 0.0, 1.0);
    let to_pixels = |p: Vec4| {
        Vec3::new(
            (p.x + 1.0) * 0.5 * viewport.width,
            (p.y + 1.0) * 0.5 * viewport.height,
            p.z,
        )
    };
    to_pixels(origin).distance(to_pixels(offset))
}

/// Converts overlay anchors into screen-stable billboard transforms.
#[derive(Debug, Clone, Copy)]
pub struct OverlayProjector {
    camera: OverlayCamera,
    viewport: Viewport,
    clip_from_world: Mat4,
    world_from_clip: Mat4,
}

impl OverlayProjector {
    pub fn new(camera: OverlayCamera, viewport: Viewport) -> Self {
        let clip_from_world = camera.clip_from_world();
        Self {
            camera,
            viewport,
            clip_from_world,
            world_from_clip: clip_from_world.inverse(),
        }
    }

    pub fn camera(&self) -> &OverlayCamera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Pixel size a unit sphere at `target` occupies.
    pub fn projected_radius(&self, target: Vec3) -> f32 {
        match self.camera.mode {
            ProjectionMode::Perspective { fov } => projected_radius_perspective(
                1.0,
                fov,
                self.camera.position().distance(target),
                self.viewport.height,
            ),
            ProjectionMode::Orthographic => {
                projected_radius_orthographic(1.0, &self.camera.clip_from_view, self.viewport)
            }
        }
    }

    /// Scale that renders a unit element at `target` as `desired_px` pixels.
    pub fn billboard_scale(&self, target: Vec3, desired_px: f32) -> f32 {
        let radius = self.projected_radius(target);
        if radius.is_finite() && radius > 0.0 {
            desired_px / radius
        } else {
            0.0
        }
    }

    /// Pixel coordinates of `position`, origin top-left, y down.
    pub fn world_to_screen(&self, position: Vec3) -> Option<Vec2> {
        let clip = self.clip_from_world * position.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc.y) * 0.5 * self.viewport.height,
        ))
    }

    /// World point under pixel `screen` at normalised device depth `ndc_depth`.
    pub fn screen_to_world(&self, screen: Vec2, ndc_depth: f32) -> Vec3 {
        let ndc = Vec3::new(
            screen.x / self.viewport.width * 2.0 - 1.0,
            -(screen.y / self.viewport.height) * 2.0 + 1.0,
            ndc_depth,
        );
        self.world_from_clip.project_point3(ndc)
    }

    /// Position that draws `offset_px` pixels above `anchor` on screen.
    pub fn label_position(&self, anchor: Vec3, offset_px: f32) -> Vec3 {
        let Some(screen) = self.world_to_screen(anchor) else {
            return anchor;
        };
        let lifted = Vec2::new(screen.x.round(), screen.y.round() - offset_px);
        let unprojected = self.screen_to_world(lifted, 0.5);

        if self.camera.is_perspective() {
            // Keep the anchor's distance so the label does not drift in depth.
            let eye = self.camera.position();
            let distance = eye.distance(anchor);
            let ray = (unprojected - eye).normalize_or_zero();
            eye + ray * distance
        } else {
            unprojected
        }
    }

    /// One billboard per overlay anchor, in [`ChainOverlay::anchors`] order.
    pub fn project_chain(&self, overlay: &ChainOverlay, sizes: &OverlaySizes) -> Vec<Billboard> {
        overlay
            .anchors()
            .into_iter()
            .map(|anchor| {
                let (position, desired) = match anchor.kind {
                    AnchorKind::Vertex(_) => (anchor.position, sizes.marker_px),
                    AnchorKind::CoordinateLabel(_) => (
                        self.label_position(anchor.position, sizes.coordinate_offset_px),
                        sizes.label_px,
                    ),
                    _ => (anchor.position, sizes.label_px),
                };
                Billboard {
                    anchor: anchor.kind,
                    position,
                    scale: self.billboard_scale(anchor.position, desired),
                    screen: self.world_to_screen(position),
                    visible: anchor.visible,
                    text: anchor.text,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::{ChainConfig, MeasurementChain};
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const VIEWPORT: Viewport = Viewport {
        width: 800.0,
        height: 600.0,
    };

    fn looking_at_origin(distance: f32) -> Mat4 {
        Transform::from_xyz(0.0, 0.0, distance)
            .looking_at(Vec3::ZERO, Vec3::Y)
            .compute_matrix()
    }

    fn perspective(distance: f32) -> OverlayProjector {
        let camera = OverlayCamera::perspective(
            looking_at_origin(distance),
            FRAC_PI_2,
            VIEWPORT.aspect_ratio(),
            0.1,
        );
        OverlayProjector::new(camera, VIEWPORT)
    }

    fn orthographic(distance: f32) -> OverlayProjector {
        let clip_from_view = Mat4::orthographic_rh(-10.0, 10.0, -7.5, 7.5, 1000.0, 0.1);
        let camera = OverlayCamera::orthographic(looking_at_origin(distance), clip_from_view);
        OverlayProjector::new(camera, VIEWPORT)
    }

    #[test]
    fn perspective_radius_matches_closed_form() {
        // tan(45°) = 1, so the radius is (H/2) / distance.
        assert_relative_eq!(perspective(10.0).projected_radius(Vec3::ZERO), 30.0, epsilon = 1e-4);
        assert_relative_eq!(
            projected_radius_perspective(2.0, FRAC_PI_2, 10.0, 600.0),
            60.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn doubling_distance_halves_perspective_radius() {
        let near = perspective(10.0).projected_radius(Vec3::ZERO);
        let far = perspective(20.0).projected_radius(Vec3::ZERO);
        assert_relative_eq!(far, near / 2.0, epsilon = 1e-4);
    }

    #[test]
    fn orthographic_radius_ignores_distance() {
        let near = orthographic(10.0).projected_radius(Vec3::ZERO);
        let far = orthographic(200.0).projected_radius(Vec3::ZERO);
        // m00 = 2 / 20, times half the viewport width.
        assert_relative_eq!(near, 40.0, epsilon = 1e-4);
        assert_relative_eq!(near, far, epsilon = 1e-4);
    }

    #[test]
    fn billboard_scale_keeps_pixel_size() {
        let projector = perspective(10.0);
        assert_relative_eq!(projector.billboard_scale(Vec3::ZERO, 15.0), 0.5, epsilon = 1e-5);
        // At the eye the radius is infinite.
        assert_eq!(projector.billboard_scale(Vec3::new(0.0, 0.0, 10.0), 15.0), 0.0);
    }

    #[test]
    fn straight_ahead_lands_mid_screen() {
        let screen = perspective(10.0).world_to_screen(Vec3::ZERO).unwrap();
        assert_relative_eq!(screen.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(screen.y, 300.0, epsilon = 1e-3);
        assert!(perspective(10.0).world_to_screen(Vec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn perspective_label_floats_above_at_same_distance() {
        let projector = perspective(10.0);
        let anchor = Vec3::new(1.0, 0.5, 0.0);
        let label = projector.label_position(anchor, 30.0);

        let eye = projector.camera().position();
        assert_relative_eq!(eye.distance(label), eye.distance(anchor), epsilon = 1e-3);

        let before = projector.world_to_screen(anchor).unwrap();
        let after = projector.world_to_screen(label).unwrap();
        assert_relative_eq!(after.y, before.y.round() - 30.0, epsilon = 0.05);
        assert_relative_eq!(after.x, before.x.round(), epsilon = 0.05);
    }

    #[test]
    fn orthographic_label_moves_up_on_screen() {
        let projector = orthographic(50.0);
        let anchor = Vec3::new(-2.0, 1.0, 0.0);
        let label = projector.label_position(anchor, 30.0);

        let before = projector.world_to_screen(anchor).unwrap();
        let after = projector.world_to_screen(label).unwrap();
        assert_relative_eq!(after.y, before.y.round() - 30.0, epsilon = 0.05);
        assert!(label.y > anchor.y);
    }

    #[test]
    fn chain_billboards_follow_anchor_order() {
        let mut chain = MeasurementChain::new(ChainConfig::default());
        chain.add_point(Vec3::ZERO, None).unwrap();
        chain.add_point(Vec3::X, None).unwrap();

        let projector = perspective(10.0);
        let billboards = projector.project_chain(chain.overlay(), &OverlaySizes::default());
        let anchors = chain.overlay().anchors();

        assert_eq!(billboards.len(), anchors.len());
        assert_eq!(billboards[0].anchor, AnchorKind::Vertex(0));
        assert_relative_eq!(billboards[0].scale, 0.5, epsilon = 1e-5);
        assert!(billboards.iter().zip(&anchors).all(|(b, a)| b.anchor == a.kind));
    }
}

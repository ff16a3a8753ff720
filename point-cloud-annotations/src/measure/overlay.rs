//! Derived overlay model of a measurement chain.
//!
//! A [`ChainOverlay`] is rebuilt from scratch on every recompute, so the number
//! of vertex elements always equals the point count and the number of edge
//! elements always equals the segment count. Renderers diff against it rather
//! than patching their own per-point lists.

use bevy::prelude::*;
use serde::Serialize;

use super::chain::ChainConfig;
use super::geometry::{self, HeightProfile};
use super::labels::{format_angle, format_area, format_length};
use super::point::MeasurePoint;

/// Which chain element an anchor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum AnchorKind {
    Vertex(usize),
    EdgeLabel(usize),
    AngleLabel(usize),
    CoordinateLabel(usize),
    HeightLabel,
    AreaLabel,
}

impl AnchorKind {
    /// Markers are drawn as geometry; every other anchor carries text.
    pub fn is_label(&self) -> bool {
        !matches!(self, AnchorKind::Vertex(_))
    }
}

/// A 3D position an on-screen element is attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub kind: AnchorKind,
    pub position: Vec3,
    pub visible: bool,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayLabel {
    pub text: String,
    pub position: Vec3,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexOverlay {
    pub position: Vec3,
    /// Interior angle in radians (0 when undefined).
    pub angle: f32,
    pub angle_label: OverlayLabel,
    pub coordinate_label: OverlayLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeOverlay {
    pub start: Vec3,
    pub end: Vec3,
    pub length: f32,
    pub visible: bool,
    pub label: OverlayLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeightOverlay {
    pub profile: HeightProfile,
    pub visible: bool,
    pub label: OverlayLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaOverlay {
    pub area: f32,
    pub centroid: Vec3,
    pub label: OverlayLabel,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainOverlay {
    pub vertices: Vec<VertexOverlay>,
    pub edges: Vec<EdgeOverlay>,
    pub height: Option<HeightOverlay>,
    pub area: Option<AreaOverlay>,
}

/// Number of drawn segments for `len` points.
pub fn edge_count(len: usize, closed: bool) -> usize {
    match (len, closed) {
        (0, _) => 0,
        (n, true) => n,
        (n, false) => n - 1,
    }
}

impl ChainOverlay {
    pub fn build(points: &[MeasurePoint], config: &ChainConfig) -> Self {
        let positions: Vec<Vec3> = points.iter().map(|p| p.position).collect();
        let n = positions.len();
        if n == 0 {
            return Self::default();
        }

        let show = &config.visibility;
        let unit = &config.unit;
        let last = n - 1;

        let vertices = (0..n)
            .map(|i| {
                let point = positions[i];
                let (previous, next) = geometry::neighbours(n, i);
                let angle = geometry::interior_angle(&positions, i);

                // Nudge the angle label into the corner, a ninth of the shorter leg.
                let inward = ((positions[previous] + positions[next]) * 0.5 - point)
                    .normalize_or_zero();
                let leg = point
                    .distance(positions[previous])
                    .min(point.distance(positions[next]));
                let angle_position = point + inward * (leg / 9.0);

                VertexOverlay {
                    position: point,
                    angle,
                    angle_label: OverlayLabel {
                        text: format_angle(angle),
                        position: angle_position,
                        visible: show.angles
                            && n >= 3
                            && (i < last || config.closed)
                            && angle > 0.0,
                    },
                    coordinate_label: OverlayLabel {
                        text: format_length(point.z, unit),
                        position: point,
                        visible: show.coordinates,
                    },
                }
            })
            .collect();

        let edges = (0..edge_count(n, config.closed))
            .map(|i| {
                let start = positions[i];
                let end = positions[(i + 1) % n];
                let length = start.distance(end);
                EdgeOverlay {
                    start,
                    end,
                    length,
                    visible: n >= 2,
                    label: OverlayLabel {
                        text: format_length(length, unit),
                        position: (start + end) * 0.5,
                        visible: show.distances && n >= 2 && length > 0.0,
                    },
                }
            })
            .collect();

        let height = geometry::height_profile(&positions).map(|profile| {
            let visible = show.height && n >= 2;
            HeightOverlay {
                profile,
                visible,
                label: OverlayLabel {
                    text: format_length(profile.height, unit),
                    position: profile.label_position(),
                    visible,
                },
            }
        });

        let area = geometry::centroid(&positions).map(|centroid| {
            let area = geometry::shoelace_area(&positions);
            AreaOverlay {
                area,
                centroid,
                label: OverlayLabel {
                    text: format_area(area, unit),
                    position: centroid,
                    visible: show.area && n >= 3,
                },
            }
        });

        Self {
            vertices,
            edges,
            height,
            area,
        }
    }

    /// Every anchor of the overlay, markers first, in a stable order.
    pub fn anchors(&self) -> Vec<Anchor> {
        fn labelled(kind: AnchorKind, label: &OverlayLabel) -> Anchor {
            Anchor {
                kind,
                position: label.position,
                visible: label.visible,
                text: Some(label.text.clone()),
            }
        }

        let mut anchors = Vec::with_capacity(self.vertices.len() * 3 + self.edges.len() + 2);

        anchors.extend(self.vertices.iter().enumerate().map(|(i, v)| Anchor {
            kind: AnchorKind::Vertex(i),
            position: v.position,
            visible: true,
            text: None,
        }));
        anchors.extend(
            self.edges
                .iter()
                .enumerate()
                .map(|(i, e)| labelled(AnchorKind::EdgeLabel(i), &e.label)),
        );
        anchors.extend(
            self.vertices
                .iter()
                .enumerate()
                .map(|(i, v)| labelled(AnchorKind::AngleLabel(i), &v.angle_label)),
        );
        anchors.extend(
            self.vertices
                .iter()
                .enumerate()
                .map(|(i, v)| labelled(AnchorKind::CoordinateLabel(i), &v.coordinate_label)),
        );
        if let Some(height) = &self.height {
            anchors.push(labelled(AnchorKind::HeightLabel, &height.label));
        }
        if let Some(area) = &self.area {
            anchors.push(labelled(AnchorKind::AreaLabel, &area.label));
        }

        anchors
    }
}

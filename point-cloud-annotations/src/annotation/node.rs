use bevy::prelude::*;
use constants::render_settings::ANNOTATION_COLLAPSE_THRESHOLD;
use serde::{Deserialize, Serialize};
use slotmap::{Key, KeyData, new_key_type};

new_key_type! {
    /// Stable handle to a node in an [`AnnotationTree`](super::AnnotationTree).
    pub struct AnnotationId;
}

impl AnnotationId {
    /// Integer form used on the RPC wire.
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

pub const DEFAULT_ANNOTATION_TITLE: &str = "Annotation #1";

/// User-triggerable action shown next to an annotation title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationAction {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub tooltip: Option<String>,
    /// Surfaces the action appears on; empty means everywhere.
    #[serde(default)]
    pub show_in: Vec<String>,
}

impl AnnotationAction {
    pub fn is_shown_in(&self, surface: &str) -> bool {
        self.show_in.is_empty() || self.show_in.iter().any(|s| s == surface)
    }
}

/// Serialisable description of an annotation and its children.
/// Used by scene files and the `annotation_commit` RPC method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationDesc {
    pub title: Option<String>,
    pub description: String,
    pub position: Option<Vec3>,
    pub camera_position: Option<Vec3>,
    pub camera_target: Option<Vec3>,
    pub radius: Option<f32>,
    pub actions: Vec<AnnotationAction>,
    pub collapse_threshold: Option<f32>,
    pub children: Vec<AnnotationDesc>,
}

/// Axis-aligned box around an annotation subtree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnotationBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl AnnotationBounds {
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the enclosing sphere.
    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Camera recipe an annotation flies to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewRecipe {
    /// Fly the eye to `position` while turning towards `target`.
    LookFrom { position: Vec3, target: Vec3 },
    /// Keep the current view direction and back off `radius` from `target`.
    Orbit { target: Vec3, radius: f32 },
}

impl ViewRecipe {
    pub fn target(&self) -> Vec3 {
        match self {
            ViewRecipe::LookFrom { target, .. } | ViewRecipe::Orbit { target, .. } => *target,
        }
    }
}

/// One node of the annotation tree.
///
/// Content fields are public; structure and presentation state are changed
/// through the tree so that events and propagation stay consistent.
#[derive(Debug, Clone)]
pub struct AnnotationNode {
    pub title: String,
    pub description: String,
    pub position: Option<Vec3>,
    pub camera_position: Option<Vec3>,
    pub camera_target: Option<Vec3>,
    pub radius: Option<f32>,
    pub actions: Vec<AnnotationAction>,
    /// On-screen size in pixels above which the node expands into its children.
    pub collapse_threshold: f32,
    /// Keep the description open after the pointer leaves.
    pub keep_open: bool,

    pub(super) parent: Option<AnnotationId>,
    pub(super) children: Vec<AnnotationId>,
    pub(super) bounds: Option<AnnotationBounds>,
    pub(super) visible: bool,
    pub(super) display: bool,
    pub(super) expand: bool,
    pub(super) highlighted: bool,
    pub(super) description_visible: bool,
}

impl AnnotationNode {
    /// New detached node. Nodes start hidden until the first layout pass.
    pub fn from_desc(desc: &AnnotationDesc) -> Self {
        Self {
            title: desc
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_ANNOTATION_TITLE.to_string()),
            description: desc.description.clone(),
            position: desc.position,
            camera_position: desc.camera_position,
            camera_target: desc.camera_target,
            radius: desc.radius,
            actions: desc.actions.clone(),
            collapse_threshold: desc
                .collapse_threshold
                .unwrap_or(ANNOTATION_COLLAPSE_THRESHOLD),
            keep_open: false,
            parent: None,
            children: Vec::new(),
            bounds: None,
            visible: true,
            display: false,
            expand: false,
            highlighted: false,
            description_visible: false,
        }
    }

    pub fn parent(&self) -> Option<AnnotationId> {
        self.parent
    }

    pub fn children(&self) -> &[AnnotationId] {
        &self.children
    }

    /// Bounds as of the last `update_bounds`; `None` for an empty subtree.
    pub fn bounds(&self) -> Option<AnnotationBounds> {
        self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the presentation surface is currently shown.
    pub fn is_displayed(&self) -> bool {
        self.display
    }

    pub fn is_expanded(&self) -> bool {
        self.expand
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn is_description_visible(&self) -> bool {
        self.description_visible
    }

    /// Navigable when it carries a camera position and target, or a radius.
    pub fn has_view(&self) -> bool {
        (self.camera_target.is_some() && self.camera_position.is_some()) || self.radius.is_some()
    }

    /// Where a fly-to should look: camera target, else position, else bounds centre.
    pub fn focus_point(&self) -> Vec3 {
        self.camera_target
            .or(self.position)
            .or_else(|| self.bounds.map(|b| b.center()))
            .unwrap_or(Vec3::ZERO)
    }

    /// Fly-to recipe, or `None` if the node is not navigable.
    pub fn view_recipe(&self) -> Option<ViewRecipe> {
        if !self.has_view() {
            return None;
        }
        let target = self.focus_point();
        match (self.camera_position, self.radius) {
            (Some(position), _) => Some(ViewRecipe::LookFrom { position, target }),
            (None, Some(radius)) => Some(ViewRecipe::Orbit { target, radius }),
            (None, None) => None,
        }
    }

    /// Snapshot back into a description, children excluded.
    pub fn to_desc(&self) -> AnnotationDesc {
        AnnotationDesc {
            title: Some(self.title.clone()),
            description: self.description.clone(),
            position: self.position,
            camera_position: self.camera_position,
            camera_target: self.camera_target,
            radius: self.radius,
            actions: self.actions.clone(),
            collapse_threshold: Some(self.collapse_threshold),
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(desc: AnnotationDesc) -> AnnotationNode {
        AnnotationNode::from_desc(&desc)
    }

    #[test]
    fn defaults_from_empty_desc() {
        let n = node(AnnotationDesc::default());
        assert_eq!(n.title, DEFAULT_ANNOTATION_TITLE);
        assert_eq!(n.collapse_threshold, 100.0);
        assert!(n.is_visible());
        assert!(!n.is_displayed());
        assert!(!n.has_view());
        assert_eq!(n.view_recipe(), None);
    }

    #[test]
    fn view_requires_both_camera_fields_or_radius() {
        let only_target = node(AnnotationDesc {
            camera_target: Some(Vec3::ONE),
            ..default()
        });
        assert!(!only_target.has_view());

        let look = node(AnnotationDesc {
            camera_target: Some(Vec3::ONE),
            camera_position: Some(Vec3::ZERO),
            ..default()
        });
        assert_eq!(
            look.view_recipe(),
            Some(ViewRecipe::LookFrom {
                position: Vec3::ZERO,
                target: Vec3::ONE
            })
        );

        let orbit = node(AnnotationDesc {
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
            radius: Some(5.0),
            ..default()
        });
        assert_eq!(
            orbit.view_recipe(),
            Some(ViewRecipe::Orbit {
                target: Vec3::new(1.0, 2.0, 3.0),
                radius: 5.0
            })
        );
    }

    #[test]
    fn desc_parses_from_json() {
        let desc: AnnotationDesc = serde_json::from_str(
            r#"{
                "title": "Kerb",
                "position": [1.0, 2.0, 3.0],
                "actions": [{ "name": "open", "show_in": ["scene"] }],
                "children": [{ "description": "drop" }]
            }"#,
        )
        .unwrap();
        assert_eq!(desc.title.as_deref(), Some("Kerb"));
        assert_eq!(desc.position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert!(desc.actions[0].is_shown_in("scene"));
        assert!(!desc.actions[0].is_shown_in("sidebar"));
        assert_eq!(desc.children.len(), 1);
    }

    #[test]
    fn raw_id_round_trip() {
        let mut arena = slotmap::SlotMap::<AnnotationId, ()>::with_key();
        let id = arena.insert(());
        assert_eq!(AnnotationId::from_raw(id.to_raw()), id);
    }

    #[test]
    fn bounds_geometry() {
        let b = AnnotationBounds::from_point(Vec3::ZERO).union(&AnnotationBounds::from_point(
            Vec3::new(2.0, 2.0, 1.0),
        ));
        assert_eq!(b.center(), Vec3::new(1.0, 1.0, 0.5));
        assert_eq!(b.radius(), 1.5);
        assert!(b.contains(Vec3::new(1.0, 0.5, 0.5)));
        assert!(!b.contains(Vec3::new(3.0, 0.5, 0.5)));
    }
}

use bevy::prelude::*;
use serde::Serialize;

use super::node::AnnotationId;
use super::tree::AnnotationTree;
use crate::projection::OverlayProjector;

/// Where the frontend draws one annotation label this frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationLayout {
    pub id: u64,
    pub title: String,
    pub screen: Vec2,
    /// Camera distance, for stacking order.
    pub distance: f32,
    pub description_visible: bool,
}

struct Decision {
    id: AnnotationId,
    expand: bool,
    on_screen: Option<(Vec2, f32)>,
}

/// Per-frame expand/collapse pass over the tree.
///
/// A group expands into its children once its bounding sphere covers more
/// than its collapse threshold on screen, or when the camera is inside it.
/// Collapsed nodes are displayed when they project in front of the camera.
/// Returns the labels to draw.
pub fn layout_annotations(
    tree: &mut AnnotationTree,
    projector: &OverlayProjector,
) -> Vec<AnnotationLayout> {
    let root = tree.root();
    tree.update_bounds(root);
    let eye = projector.camera().position();

    let mut decisions = Vec::new();
    tree.traverse(root, |id, node| {
        if id == root {
            return true;
        }
        if !node.is_visible() {
            return false;
        }

        let position = node
            .position
            .or_else(|| node.bounds().map(|b| b.center()))
            .unwrap_or(Vec3::ZERO);
        let radius = node.bounds().map(|b| b.radius()).unwrap_or(0.0);
        let screen_size = radius * projector.projected_radius(position);
        let inside = node.bounds().is_some_and(|b| b.contains(eye));

        let expand = screen_size > node.collapse_threshold || inside;
        let on_screen = projector
            .world_to_screen(position)
            .map(|screen| (screen, eye.distance(position)));

        decisions.push(Decision {
            id,
            expand,
            on_screen,
        });
        expand
    });

    let mut labels = Vec::new();
    for decision in decisions {
        // Ids come from the traversal above.
        let _ = tree.set_expand(decision.id, decision.expand);
        if decision.expand {
            continue;
        }
        let _ = tree.set_display(decision.id, decision.on_screen.is_some());

        if let (Some((screen, distance)), Some(node)) = (decision.on_screen, tree.get(decision.id)) {
            labels.push(AnnotationLayout {
                id: decision.id.to_raw(),
                title: node.title.clone(),
                screen,
                distance,
                description_visible: node.is_description_visible(),
            });
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationDesc;
    use crate::projection::{OverlayCamera, Viewport};
    use std::f32::consts::FRAC_PI_2;

    fn projector(distance: f32) -> OverlayProjector {
        let world_from_view = Transform::from_xyz(5.0, 0.0, distance)
            .looking_at(Vec3::new(5.0, 0.0, 0.0), Vec3::Y)
            .compute_matrix();
        let viewport = Viewport::new(800.0, 600.0);
        let camera =
            OverlayCamera::perspective(world_from_view, FRAC_PI_2, viewport.aspect_ratio(), 0.1);
        OverlayProjector::new(camera, viewport)
    }

    fn group_tree() -> (AnnotationTree, AnnotationId, Vec<AnnotationId>) {
        let mut tree = AnnotationTree::new();
        let root = tree.root();
        let group = tree
            .insert(
                root,
                &AnnotationDesc {
                    title: Some("group".into()),
                    ..default()
                },
            )
            .unwrap();
        let leaves = [Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]
            .into_iter()
            .map(|p| {
                tree.insert(
                    group,
                    &AnnotationDesc {
                        position: Some(p),
                        ..default()
                    },
                )
                .unwrap()
            })
            .collect();
        (tree, group, leaves)
    }

    #[test]
    fn near_group_expands_into_children() {
        let (mut tree, group, leaves) = group_tree();
        // Sphere radius 5 at distance 10: 150 px, above the 100 px threshold.
        let labels = layout_annotations(&mut tree, &projector(10.0));

        assert!(tree.get(group).unwrap().is_expanded());
        assert!(!tree.get(group).unwrap().is_displayed());
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| leaves.iter().any(|id| id.to_raw() == l.id)));
    }

    #[test]
    fn far_group_collapses() {
        let (mut tree, group, leaves) = group_tree();
        let labels = layout_annotations(&mut tree, &projector(100.0));

        assert!(!tree.get(group).unwrap().is_expanded());
        assert!(tree.get(group).unwrap().is_displayed());
        assert!(!tree.get(leaves[0]).unwrap().is_displayed());
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].title, "group");
        assert!((labels[0].screen - Vec2::new(400.0, 300.0)).length() < 1e-2);
    }

    #[test]
    fn hidden_subtrees_are_skipped() {
        let (mut tree, group, _) = group_tree();
        tree.set_visible(group, false).unwrap();
        assert!(layout_annotations(&mut tree, &projector(10.0)).is_empty());
    }
}

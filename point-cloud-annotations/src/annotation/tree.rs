use bevy::prelude::*;
use slotmap::SlotMap;

use super::node::{AnnotationBounds, AnnotationDesc, AnnotationId, AnnotationNode, ViewRecipe};
use crate::error::AnnotationError;
use crate::events::{EventBus, NamedEvent};

pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// Notifications published by an [`AnnotationTree`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnotationEvent {
    /// `annotation` was attached somewhere below `listener`. Published once per
    /// ancestor, nearest first.
    Added {
        listener: AnnotationId,
        annotation: AnnotationId,
    },
    Removed {
        annotation: AnnotationId,
    },
    VisibilityChanged {
        annotation: AnnotationId,
        visible: bool,
    },
    Click {
        annotation: AnnotationId,
    },
    ActionTriggered {
        annotation: AnnotationId,
        action: usize,
    },
    FocusingStarted {
        annotation: AnnotationId,
    },
    FocusingFinished {
        annotation: AnnotationId,
    },
}

impl NamedEvent for AnnotationEvent {
    fn name(&self) -> &'static str {
        match self {
            AnnotationEvent::Added { .. } => "annotation_added",
            AnnotationEvent::Removed { .. } => "annotation_removed",
            AnnotationEvent::VisibilityChanged { .. } => "visibility_changed",
            AnnotationEvent::Click { .. } => "click",
            AnnotationEvent::ActionTriggered { .. } => "action_triggered",
            AnnotationEvent::FocusingStarted { .. } => "focusing_started",
            AnnotationEvent::FocusingFinished { .. } => "focusing_finished",
        }
    }
}

/// Arena-backed annotation hierarchy with a permanent root.
///
/// Parent links are plain ids, so a node never owns its parent and the tree
/// can be walked in either direction without reference cycles.
#[derive(Debug)]
pub struct AnnotationTree {
    nodes: SlotMap<AnnotationId, AnnotationNode>,
    root: AnnotationId,
    events: EventBus<AnnotationEvent>,
}

impl Default for AnnotationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationTree {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(AnnotationNode::from_desc(&AnnotationDesc {
            title: Some("Annotations".to_string()),
            ..default()
        }));
        Self {
            nodes,
            root,
            events: EventBus::new(),
        }
    }

    pub fn root(&self) -> AnnotationId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&AnnotationNode> {
        self.nodes.get(id)
    }

    /// Mutable access to content fields (title, view recipe, ...).
    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut AnnotationNode> {
        self.nodes.get_mut(id)
    }

    pub fn events(&mut self) -> &mut EventBus<AnnotationEvent> {
        &mut self.events
    }

    fn node(&self, id: AnnotationId) -> AnnotationResult<&AnnotationNode> {
        self.nodes.get(id).ok_or(AnnotationError::UnknownAnnotation)
    }

    fn node_mut(&mut self, id: AnnotationId) -> AnnotationResult<&mut AnnotationNode> {
        self.nodes
            .get_mut(id)
            .ok_or(AnnotationError::UnknownAnnotation)
    }

    /// Create a detached node, with `desc.children` attached below it.
    pub fn create(&mut self, desc: &AnnotationDesc) -> AnnotationId {
        let id = self.nodes.insert(AnnotationNode::from_desc(desc));
        for child in &desc.children {
            let child_id = self.create(child);
            // Fresh nodes cannot form a cycle.
            let _ = self.add(id, child_id);
        }
        id
    }

    /// Create from `desc` and attach under `parent`.
    pub fn insert(
        &mut self,
        parent: AnnotationId,
        desc: &AnnotationDesc,
    ) -> AnnotationResult<AnnotationId> {
        self.node(parent)?;
        let id = self.create(desc);
        self.add(parent, id)?;
        Ok(id)
    }

    /// Attach `child` under `parent`. Returns false if it already was a child.
    ///
    /// A child attached elsewhere is moved. Every ancestor of the new position
    /// hears about every node of the attached subtree.
    pub fn add(&mut self, parent: AnnotationId, child: AnnotationId) -> AnnotationResult<bool> {
        self.node(child)?;
        if self.node(parent)?.children.contains(&child) {
            return Ok(false);
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(AnnotationError::Cycle);
        }

        if let Some(previous) = self.node(child)?.parent {
            self.node_mut(previous)?.children.retain(|c| *c != child);
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);

        let attached = self.flatten(child);
        let listeners = self.ancestors_inclusive(parent);
        for annotation in attached {
            for listener in &listeners {
                self.events.publish(&AnnotationEvent::Added {
                    listener: *listener,
                    annotation,
                });
            }
        }
        Ok(true)
    }

    /// Detach `child` from `parent`. The node stays in the arena.
    pub fn remove(&mut self, parent: AnnotationId, child: AnnotationId) -> AnnotationResult<bool> {
        let parent_node = self.node_mut(parent)?;
        let before = parent_node.children.len();
        parent_node.children.retain(|c| *c != child);
        let removed = before != parent_node.children.len();

        if removed {
            self.node_mut(child)?.parent = None;
        }
        Ok(removed)
    }

    /// Detach `id` and drop its whole subtree. Disposing the root clears the
    /// tree but keeps the root itself.
    pub fn dispose(&mut self, id: AnnotationId) -> AnnotationResult<Vec<AnnotationNode>> {
        let doomed = if id == self.root {
            self.descendants(id)
        } else {
            if let Some(parent) = self.node(id)?.parent {
                self.remove(parent, id)?;
            }
            self.flatten(id)
        };
        if id == self.root {
            self.node_mut(id)?.children.clear();
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for annotation in doomed {
            if let Some(node) = self.nodes.remove(annotation) {
                self.events
                    .publish(&AnnotationEvent::Removed { annotation });
                removed.push(node);
            }
        }
        Ok(removed)
    }

    /// Depth below the topmost ancestor (the root is level 0).
    pub fn level(&self, id: AnnotationId) -> AnnotationResult<usize> {
        self.node(id)?;
        Ok(self.ancestors_inclusive(id).len() - 1)
    }

    /// Pre-order walk from `id`. Returning false from `visit` skips that
    /// node's children.
    pub fn traverse(
        &self,
        id: AnnotationId,
        mut visit: impl FnMut(AnnotationId, &AnnotationNode) -> bool,
    ) {
        self.walk(vec![id], &mut visit);
    }

    /// Pre-order walk of every child subtree of `id`, excluding `id`.
    pub fn traverse_descendants(
        &self,
        id: AnnotationId,
        mut visit: impl FnMut(AnnotationId, &AnnotationNode) -> bool,
    ) {
        let start = self
            .nodes
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        self.walk(start, &mut visit);
    }

    fn walk(
        &self,
        mut stack: Vec<AnnotationId>,
        visit: &mut impl FnMut(AnnotationId, &AnnotationNode) -> bool,
    ) {
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if visit(id, node) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// `id` and all its descendants, pre-order.
    pub fn flatten(&self, id: AnnotationId) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        self.traverse(id, |n, _| {
            out.push(n);
            true
        });
        out
    }

    /// All descendants of `id`, pre-order, never `id` itself.
    pub fn descendants(&self, id: AnnotationId) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        self.traverse_descendants(id, |n, _| {
            out.push(n);
            true
        });
        out
    }

    /// `id`, its parent, and so on up to the topmost ancestor.
    fn ancestors_inclusive(&self, id: AnnotationId) -> Vec<AnnotationId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            chain.push(c);
            current = self.nodes.get(c).and_then(|n| n.parent);
        }
        chain
    }

    fn is_ancestor(&self, ancestor: AnnotationId, of: AnnotationId) -> bool {
        self.ancestors_inclusive(of).contains(&ancestor)
    }

    /// Recompute bounds bottom-up for the subtree at `id`.
    pub fn update_bounds(&mut self, id: AnnotationId) -> Option<AnnotationBounds> {
        let (position, children) = {
            let node = self.nodes.get(id)?;
            (node.position, node.children.clone())
        };

        let mut bounds = position.map(AnnotationBounds::from_point);
        for child in children {
            if let Some(child_bounds) = self.update_bounds(child) {
                bounds = Some(match bounds {
                    Some(b) => b.union(&child_bounds),
                    None => child_bounds,
                });
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.bounds = bounds;
        }
        bounds
    }

    /// Show or hide a subtree. Display follows for every node below.
    pub fn set_visible(&mut self, id: AnnotationId, visible: bool) -> AnnotationResult<()> {
        if self.node(id)?.visible == visible {
            return Ok(());
        }
        self.node_mut(id)?.visible = visible;
        for n in self.flatten(id) {
            self.node_mut(n)?.display = visible;
        }
        self.events.publish(&AnnotationEvent::VisibilityChanged {
            annotation: id,
            visible,
        });
        Ok(())
    }

    pub fn set_display(&mut self, id: AnnotationId, display: bool) -> AnnotationResult<()> {
        self.node_mut(id)?.display = display;
        Ok(())
    }

    /// Expanded nodes hand their screen space to their children; collapsed
    /// nodes show themselves and hide everything below.
    pub fn set_expand(&mut self, id: AnnotationId, expand: bool) -> AnnotationResult<()> {
        if self.node(id)?.expand == expand {
            return Ok(());
        }
        if expand {
            self.node_mut(id)?.display = false;
        } else {
            self.node_mut(id)?.display = true;
            for n in self.descendants(id) {
                self.node_mut(n)?.display = false;
            }
        }
        self.node_mut(id)?.expand = expand;
        Ok(())
    }

    pub fn set_highlighted(&mut self, id: AnnotationId, highlighted: bool) -> AnnotationResult<()> {
        let node = self.node_mut(id)?;
        node.highlighted = highlighted;
        node.description_visible = highlighted && !node.description.is_empty();
        Ok(())
    }

    /// Title click. Returns the recipe to fly to when the node is navigable.
    pub fn click(&mut self, id: AnnotationId) -> AnnotationResult<Option<ViewRecipe>> {
        let recipe = self.node(id)?.view_recipe();
        self.events
            .publish(&AnnotationEvent::Click { annotation: id });
        Ok(recipe)
    }

    pub fn trigger_action(&mut self, id: AnnotationId, action: usize) -> AnnotationResult<()> {
        if action >= self.node(id)?.actions.len() {
            return Err(AnnotationError::UnknownAction { index: action });
        }
        self.events.publish(&AnnotationEvent::ActionTriggered {
            annotation: id,
            action,
        });
        Ok(())
    }

    pub fn has_view(&self, id: AnnotationId) -> AnnotationResult<bool> {
        Ok(self.node(id)?.has_view())
    }

    pub fn view_recipe(&self, id: AnnotationId) -> AnnotationResult<ViewRecipe> {
        self.node(id)?.view_recipe().ok_or(AnnotationError::NoView)
    }

    /// Serialise the subtree at `id` back into a description.
    pub fn to_desc(&self, id: AnnotationId) -> AnnotationResult<AnnotationDesc> {
        let node = self.node(id)?;
        let mut desc = node.to_desc();
        for child in &node.children {
            desc.children.push(self.to_desc(*child)?);
        }
        Ok(desc)
    }
}

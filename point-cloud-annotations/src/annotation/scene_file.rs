use bevy::prelude::*;
use constants::path::{DEFAULT_ANNOTATION_SCENE, RELATIVE_ANNOTATIONS_PATH};
use serde::{Deserialize, Serialize};

use super::node::AnnotationDesc;
use super::tree::AnnotationTree;
use crate::error::AnnotationError;

/// Annotation scene file as a Bevy asset. Mirrors the JSON exactly.
#[derive(Asset, TypePath, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationSceneFile {
    #[serde(default)]
    pub annotations: Vec<AnnotationDesc>,
}

impl AnnotationSceneFile {
    /// Attach every top-level annotation under the tree root.
    pub fn instantiate(&self, tree: &mut AnnotationTree) -> Result<usize, AnnotationError> {
        let root = tree.root();
        for desc in &self.annotations {
            tree.insert(root, desc)?;
        }
        Ok(self.annotations.len())
    }
}

#[derive(Resource, Default)]
pub struct AnnotationSceneLoader {
    handle: Option<Handle<AnnotationSceneFile>>,
    instantiated: bool,
}

pub fn start_annotation_loading(
    mut loader: ResMut<AnnotationSceneLoader>,
    asset_server: Res<AssetServer>,
) {
    let path = format!("{}/{}", RELATIVE_ANNOTATIONS_PATH, DEFAULT_ANNOTATION_SCENE);
    loader.handle = Some(asset_server.load(&path));
}

/// Instantiate the scene file once it has loaded.
pub fn instantiate_annotation_scene(
    mut loader: ResMut<AnnotationSceneLoader>,
    scenes: Res<Assets<AnnotationSceneFile>>,
    mut annotations: ResMut<crate::tools::annotation::AnnotationState>,
) {
    if loader.instantiated {
        return;
    }
    let Some(scene) = loader.handle.as_ref().and_then(|h| scenes.get(h)) else {
        return;
    };

    match scene.instantiate(&mut annotations.tree) {
        Ok(count) => info!("✓ Annotation scene loaded: {} top-level annotations", count),
        Err(err) => warn!("Annotation scene could not be instantiated: {}", err),
    }
    loader.instantiated = true;
}

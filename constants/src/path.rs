/// Asset-relative directory holding annotation scene files.
pub const RELATIVE_ANNOTATIONS_PATH: &str = "annotations";

/// Scene file loaded at startup, relative to [`RELATIVE_ANNOTATIONS_PATH`].
pub const DEFAULT_ANNOTATION_SCENE: &str = "scene.annotations.json";

/// Extension registered with the JSON asset loader for annotation scenes.
pub const ANNOTATION_SCENE_EXTENSION: &str = "annotations.json";

//! Annotation hierarchy: titled markers with camera view recipes.
//!
//! ```text
//! scene file / RPC commit
//!   └─> AnnotationTree::{create, add}      (slotmap arena, strict tree)
//!       ├─> EventBus<AnnotationEvent>      annotation_added / removed / ...
//!       ├─> layout_annotations()           per-frame expand/collapse + screen labels
//!       └─> click() → ViewRecipe → CameraFlight
//!
//! InsertionSession::start()                single cursor marker, CancelToken
//!   └─> release(Left) → Placed → dialog → commit into the tree
//! ```

/// Cancellable cursor-marker insertion gesture.
pub mod insertion;

/// Node data, descriptions and view recipes.
pub mod node;

/// Screen-size driven expand/collapse pass.
pub mod layout;

/// JSON scene files loaded as Bevy assets.
pub mod scene_file;

pub mod tree;

pub use insertion::{
    CancelToken, InsertionOptions, InsertionOutcome, InsertionSession, PointerButton,
};
pub use layout::{AnnotationLayout, layout_annotations};
pub use node::{
    AnnotationAction, AnnotationBounds, AnnotationDesc, AnnotationId, AnnotationNode, ViewRecipe,
};
pub use scene_file::{AnnotationSceneFile, AnnotationSceneLoader};
pub use tree::{AnnotationEvent, AnnotationResult, AnnotationTree};

use bevy::color::Color;

/// On-screen diameter, in pixels, of a measurement vertex marker.
pub const MARKER_PIXEL_SIZE: f32 = 15.0;

/// On-screen size, in pixels, of distance / angle / area / height labels.
pub const LABEL_PIXEL_SIZE: f32 = 70.0;

/// Coordinate labels float this many pixels above their vertex.
pub const COORDINATE_LABEL_PIXEL_OFFSET: f32 = 30.0;

/// Marker sphere radius in world units before billboard scaling.
pub const MARKER_SPHERE_RADIUS: f32 = 0.4;

/// Edge line thickness in world units.
pub const DRAW_LINE_WIDTH: f32 = 0.076;

/// Screen distance within which a click grabs an existing marker for dragging.
pub const MARKER_GRAB_PIXEL_RADIUS: f32 = 12.0;

/// Duration of an annotation fly-to in seconds.
pub const FLY_TO_DURATION_SECS: f32 = 0.3;

/// Subtrees whose projected bounds fall below this size collapse.
pub const ANNOTATION_COLLAPSE_THRESHOLD: f32 = 100.0;

pub const DEFAULT_CHAIN_COLOUR: Color = Color::srgb(1.0, 0.0, 0.0);

pub const LABEL_BORDER_COLOUR: Color = Color::srgba(0.0, 0.0, 0.0, 0.8);
pub const LABEL_BACKGROUND_COLOUR: Color = Color::srgba(0.0, 0.0, 0.0, 0.3);
pub const LABEL_TEXT_COLOUR: Color = Color::srgb(180.0 / 255.0, 220.0 / 255.0, 180.0 / 255.0);

use bevy::math::{Mat3, Mat4, Vec3};

/// Coordinate transformation matrix (row-major: [x_new, y_new, z_new])
/// Default: -90° X rotation (Z→Y, -Y→Z, X→X)
///
/// Point clouds arrive Z-up; the render world is Y-up. Measurements are kept in
/// source space so areas (XY) and heights (Z) read naturally.
pub const COORDINATE_TRANSFORM: [[f32; 3]; 3] = [
    [1.0, 0.0, 0.0],  // X = X
    [0.0, 0.0, 1.0],  // Y = Z
    [0.0, -1.0, 0.0], // Z = -Y
];

/// Rotation taking source (Z-up) coordinates into render (Y-up) coordinates.
pub fn render_from_source() -> Mat3 {
    let m = COORDINATE_TRANSFORM;
    Mat3::from_cols(
        Vec3::new(m[0][0], m[1][0], m[2][0]),
        Vec3::new(m[0][1], m[1][1], m[2][1]),
        Vec3::new(m[0][2], m[1][2], m[2][2]),
    )
}

/// Inverse of [`render_from_source`]. The matrix is a pure rotation.
pub fn source_from_render() -> Mat3 {
    render_from_source().transpose()
}

/// Homogeneous form of [`source_from_render`], for re-expressing camera transforms.
pub fn source_from_render_affine() -> Mat4 {
    Mat4::from_mat3(source_from_render())
}

pub fn to_render_space(source: Vec3) -> Vec3 {
    render_from_source() * source
}

pub fn to_source_space(render: Vec3) -> Vec3 {
    source_from_render() * render
}

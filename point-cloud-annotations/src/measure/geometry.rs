//! Closed-form measurement geometry over ordered point lists.
//!
//! Every function accepts any number of points and returns a neutral value
//! (0, `None`) when the input is too small to be meaningful.

use bevy::prelude::*;

/// Sum of consecutive distances; adds the last→first segment when `closed`.
pub fn total_length(points: &[Vec3], closed: bool) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }

    let open: f32 = points.windows(2).map(|w| w[0].distance(w[1])).sum();

    if closed {
        let first = points[0];
        let last = points[points.len() - 1];
        open + last.distance(first)
    } else {
        open
    }
}

/// Shoelace area of the polygon's projection onto the XY plane.
///
/// This is not the true area of a tilted planar polygon in 3D; points are
/// flattened along Z before the sum.
pub fn shoelace_area(points: &[Vec3]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let mut j = points.len() - 1;
    for (i, p1) in points.iter().enumerate() {
        let p2 = points[j];
        area += (p2.x + p1.x) * (p1.y - p2.y);
        j = i;
    }

    (area / 2.0).abs()
}

/// Unsigned angle in radians at `corner` between the rays to `a` and `b`.
///
/// Returns 0 when either ray has zero length.
pub fn angle_between(corner: Vec3, a: Vec3, b: Vec3) -> f32 {
    let v1 = a - corner;
    let v2 = b - corner;
    let denominator = (v1.length_squared() * v2.length_squared()).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    let cos = (v1.dot(v2) / denominator).clamp(-1.0, 1.0);
    cos.acos()
}

/// Cyclic predecessor and successor of `index`.
pub fn neighbours(len: usize, index: usize) -> (usize, usize) {
    let previous = if index == 0 { len - 1 } else { index - 1 };
    let next = (index + 1) % len;
    (previous, next)
}

/// Interior angle at vertex `index` using its cyclic neighbours.
pub fn interior_angle(points: &[Vec3], index: usize) -> f32 {
    if points.len() < 3 || index >= points.len() {
        return 0.0;
    }
    let (previous, next) = neighbours(points.len(), index);
    angle_between(points[index], points[previous], points[next])
}

pub fn centroid(points: &[Vec3]) -> Option<Vec3> {
    if points.is_empty() {
        return None;
    }
    let sum: Vec3 = points.iter().copied().sum();
    Some(sum / points.len() as f32)
}

/// Lowest and highest point along Z plus the vertical reference polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightProfile {
    pub low: Vec3,
    pub high: Vec3,
    pub height: f32,
    /// Foot of the vertical edge: directly below `high` at `low.z`.
    pub start: Vec3,
    /// Top of the vertical edge: `high` itself.
    pub end: Vec3,
}

impl HeightProfile {
    /// Dashed polyline drawn from the low point to the vertical edge and up it.
    pub fn polyline(&self) -> [Vec3; 4] {
        [self.low, self.start, self.start, self.end]
    }

    pub fn label_position(&self) -> Vec3 {
        (self.start + self.end) * 0.5
    }
}

pub fn height_profile(points: &[Vec3]) -> Option<HeightProfile> {
    let low = points.iter().copied().min_by(|a, b| a.z.total_cmp(&b.z))?;
    let high = points.iter().copied().max_by(|a, b| a.z.total_cmp(&b.z))?;

    let start = Vec3::new(high.x, high.y, low.z);
    let end = Vec3::new(high.x, high.y, high.z);

    Some(HeightProfile {
        low,
        high,
        height: high.z - low.z,
        start,
        end,
    })
}

pub fn vertical_extent(points: &[Vec3]) -> f32 {
    height_profile(points).map_or(0.0, |p| p.height)
}

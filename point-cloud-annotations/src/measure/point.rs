use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auxiliary per-point data copied from a pick (surface normal, intensity, ...).
pub type PointAttributes = BTreeMap<String, serde_json::Value>;

/// Result of picking the point cloud under a screen coordinate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PickResult {
    pub position: Vec3,
    #[serde(default)]
    pub attributes: PointAttributes,
}

/// A single measurement vertex.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurePoint {
    pub position: Vec3,
    #[serde(default)]
    pub attributes: PointAttributes,
}

impl MeasurePoint {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            attributes: PointAttributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Copy every pick attribute onto this point. A `position` key in the pick
    /// attributes is ignored; the pick position is authoritative.
    pub fn absorb_pick(&mut self, pick: &PickResult) {
        for (key, value) in pick.attributes.iter().filter(|(k, _)| k.as_str() != "position") {
            self.attributes.insert(key.clone(), value.clone());
        }
        self.position = pick.position;
    }
}

impl From<Vec3> for MeasurePoint {
    fn from(position: Vec3) -> Self {
        Self::new(position)
    }
}

impl From<PickResult> for MeasurePoint {
    fn from(pick: PickResult) -> Self {
        let mut point = Self::new(pick.position);
        point.absorb_pick(&pick);
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absorb_pick_keeps_existing_and_skips_position_key() {
        let mut point = MeasurePoint::new(Vec3::ZERO).with_attribute("label", json!("a"));
        let mut attributes = PointAttributes::new();
        attributes.insert("normal".into(), json!([0.0, 0.0, 1.0]));
        attributes.insert("position".into(), json!([9.0, 9.0, 9.0]));
        let pick = PickResult {
            position: Vec3::new(1.0, 2.0, 3.0),
            attributes,
        };

        point.absorb_pick(&pick);

        assert_eq!(point.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(point.attributes.get("label"), Some(&json!("a")));
        assert_eq!(point.attributes.get("normal"), Some(&json!([0.0, 0.0, 1.0])));
        assert!(!point.attributes.contains_key("position"));
    }
}

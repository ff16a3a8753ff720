use bevy::prelude::*;
use constants::render_settings::DEFAULT_CHAIN_COLOUR;
use serde::{Deserialize, Serialize};

use super::geometry::{self, HeightProfile};
use super::labels::LengthUnit;
use super::overlay::ChainOverlay;
use super::point::{MeasurePoint, PickResult};
use crate::error::{MeasureError, MeasureResult};
use crate::events::{EventBus, NamedEvent};

/// Which derived quantities are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayVisibility {
    pub distances: bool,
    pub angles: bool,
    pub height: bool,
    pub area: bool,
    pub coordinates: bool,
}

impl Default for OverlayVisibility {
    fn default() -> Self {
        Self {
            distances: true,
            angles: false,
            height: false,
            area: false,
            coordinates: false,
        }
    }
}

/// Explicit chain configuration. Edits go through
/// [`MeasurementChain::config_mut`] and take effect on the next recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Polygon (wrap-around segment included) rather than open polyline.
    pub closed: bool,
    pub max_points: usize,
    pub visibility: OverlayVisibility,
    pub colour: Color,
    pub unit: LengthUnit,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            closed: true,
            max_points: usize::MAX,
            visibility: OverlayVisibility::default(),
            colour: DEFAULT_CHAIN_COLOUR,
            unit: LengthUnit::default(),
        }
    }
}

/// Change notifications published by a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    PointAdded { index: usize, position: Vec3 },
    PointRemoved { index: usize, position: Vec3 },
    /// `position` is a copy; listeners never alias the chain's points.
    PointMoved { index: usize, position: Vec3 },
    PointDropped { index: usize },
}

impl NamedEvent for ChainEvent {
    fn name(&self) -> &'static str {
        match self {
            ChainEvent::PointAdded { .. } => "marker_added",
            ChainEvent::PointRemoved { .. } => "marker_removed",
            ChainEvent::PointMoved { .. } => "marker_moved",
            ChainEvent::PointDropped { .. } => "marker_dropped",
        }
    }
}

/// Ordered, mutable sequence of measurement points with derived overlays.
#[derive(Debug)]
pub struct MeasurementChain {
    name: String,
    points: Vec<MeasurePoint>,
    config: ChainConfig,
    overlay: ChainOverlay,
    dirty: bool,
    events: EventBus<ChainEvent>,
}

impl Default for MeasurementChain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl MeasurementChain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            name: String::new(),
            points: Vec::new(),
            config,
            overlay: ChainOverlay::default(),
            dirty: false,
            events: EventBus::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[MeasurePoint] {
        &self.points
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.points.iter().map(|p| p.position).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Mutable access to configuration; marks the overlay stale.
    pub fn config_mut(&mut self) -> &mut ChainConfig {
        self.dirty = true;
        &mut self.config
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overlay as of the last recompute.
    pub fn overlay(&self) -> &ChainOverlay {
        &self.overlay
    }

    pub fn events(&mut self) -> &mut EventBus<ChainEvent> {
        &mut self.events
    }

    /// Insert at `index` (append when `None`).
    pub fn add_point(
        &mut self,
        point: impl Into<MeasurePoint>,
        index: Option<usize>,
    ) -> MeasureResult<usize> {
        let len = self.points.len();
        if len >= self.config.max_points {
            return Err(MeasureError::CapacityExceeded {
                max: self.config.max_points,
            });
        }
        let index = index.unwrap_or(len);
        if index > len {
            return Err(MeasureError::IndexOutOfRange { index, len });
        }

        let point = point.into();
        let position = point.position;
        self.points.insert(index, point);
        self.recompute();
        self.events.publish(&ChainEvent::PointAdded { index, position });
        Ok(index)
    }

    pub fn remove_point(&mut self, index: usize) -> MeasureResult<MeasurePoint> {
        self.check_index(index)?;

        let removed = self.points.remove(index);
        self.recompute();
        self.events.publish(&ChainEvent::PointRemoved {
            index,
            position: removed.position,
        });
        Ok(removed)
    }

    /// Replace the point at `index`, attributes included.
    pub fn set_point(&mut self, index: usize, point: MeasurePoint) -> MeasureResult<()> {
        self.check_index(index)?;

        let position = point.position;
        self.points[index] = point;
        self.recompute();
        self.events.publish(&ChainEvent::PointMoved { index, position });
        Ok(())
    }

    pub fn move_point(&mut self, index: usize, position: Vec3) -> MeasureResult<()> {
        self.check_index(index)?;

        self.points[index].position = position;
        self.recompute();
        self.events.publish(&ChainEvent::PointMoved { index, position });
        Ok(())
    }

    /// Drag update: takes the pick's attributes and position.
    pub fn apply_pick(&mut self, index: usize, pick: &PickResult) -> MeasureResult<()> {
        self.check_index(index)?;

        self.points[index].absorb_pick(pick);
        self.recompute();
        self.events.publish(&ChainEvent::PointMoved {
            index,
            position: pick.position,
        });
        Ok(())
    }

    /// End of a drag on the marker at `index`.
    pub fn drop_point(&mut self, index: usize) -> MeasureResult<()> {
        self.check_index(index)?;
        self.events.publish(&ChainEvent::PointDropped { index });
        Ok(())
    }

    pub fn total_length(&self) -> f32 {
        geometry::total_length(&self.positions(), self.config.closed)
    }

    /// Shoelace area of the XY projection.
    pub fn area(&self) -> f32 {
        geometry::shoelace_area(&self.positions())
    }

    pub fn interior_angle(&self, index: usize) -> f32 {
        geometry::interior_angle(&self.positions(), index)
    }

    pub fn vertical_extent(&self) -> f32 {
        geometry::vertical_extent(&self.positions())
    }

    pub fn height_profile(&self) -> Option<HeightProfile> {
        geometry::height_profile(&self.positions())
    }

    pub fn centroid(&self) -> Option<Vec3> {
        geometry::centroid(&self.positions())
    }

    /// Rebuild the overlay from the current points and configuration.
    pub fn recompute(&mut self) {
        self.overlay = ChainOverlay::build(&self.points, &self.config);
        self.dirty = false;
    }

    /// Recompute only if configuration changed since the last rebuild.
    pub fn refresh(&mut self) -> bool {
        if self.dirty {
            self.recompute();
            true
        } else {
            false
        }
    }

    fn check_index(&self, index: usize) -> MeasureResult<()> {
        if index < self.points.len() {
            Ok(())
        } else {
            Err(MeasureError::IndexOutOfRange {
                index,
                len: self.points.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::overlay::edge_count;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;
    use std::sync::{Arc, Mutex};

    fn chain_of(closed: bool, raw: &[[f32; 3]]) -> MeasurementChain {
        let mut chain = MeasurementChain::new(ChainConfig {
            closed,
            ..default()
        });
        for p in raw {
            chain.add_point(Vec3::from_array(*p), None).unwrap();
        }
        chain
    }

    fn record(chain: &mut MeasurementChain) -> Arc<Mutex<Vec<ChainEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        chain
            .events()
            .subscribe(crate::events::ANY_EVENT, move |e: &ChainEvent| {
                sink.lock().unwrap().push(e.clone())
            });
        log
    }

    #[test]
    fn total_length_properties() {
        assert_eq!(chain_of(true, &[[1.0, 1.0, 1.0]]).total_length(), 0.0);

        let open = chain_of(false, &[[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]);
        assert_relative_eq!(open.total_length(), 5.0);

        let pts = [[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 3.0, 0.0]];
        let open = chain_of(false, &pts);
        let mut closed = chain_of(false, &pts);
        closed.config_mut().closed = true;
        assert_relative_eq!(closed.total_length() - open.total_length(), 5.0);
    }

    #[test]
    fn derived_queries() {
        let square = chain_of(
            true,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        );
        assert_relative_eq!(square.area(), 1.0);
        assert_relative_eq!(square.interior_angle(0), FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(square.interior_angle(4), 0.0);
        assert_eq!(square.vertical_extent(), 0.0);

        let stepped = chain_of(false, &[[0.0, 0.0, 1.0], [1.0, 0.0, 5.0], [1.0, 1.0, 3.0]]);
        assert_relative_eq!(stepped.vertical_extent(), 4.0);
        assert_eq!(stepped.height_profile().unwrap().high, Vec3::new(1.0, 0.0, 5.0));
    }

    #[test]
    fn capacity_is_enforced_without_mutation() {
        let mut chain = MeasurementChain::new(ChainConfig {
            max_points: 2,
            ..default()
        });
        chain.add_point(Vec3::ZERO, None).unwrap();
        chain.add_point(Vec3::X, None).unwrap();
        let log = record(&mut chain);
        let before = chain.overlay().clone();

        let err = chain.add_point(Vec3::Y, None).unwrap_err();

        assert_eq!(err, MeasureError::CapacityExceeded { max: 2 });
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.overlay(), &before);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn insert_at_index_and_reject_past_end() {
        let mut chain = chain_of(false, &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert_eq!(chain.add_point(Vec3::X, Some(1)), Ok(1));
        assert_eq!(chain.points()[1].position, Vec3::X);
        assert_eq!(
            chain.add_point(Vec3::Y, Some(7)),
            Err(MeasureError::IndexOutOfRange { index: 7, len: 3 })
        );
    }

    #[test]
    fn removal_keeps_overlay_in_lock_step() {
        for closed in [false, true] {
            let raw = [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ];
            for i in 0..raw.len() {
                let mut chain = chain_of(closed, &raw);
                chain.remove_point(i).unwrap();
                assert_eq!(chain.overlay().vertices.len(), chain.len());
                assert_eq!(chain.overlay().edges.len(), edge_count(chain.len(), closed));
            }

            let mut chain = chain_of(closed, &raw[..1]);
            chain.remove_point(0).unwrap();
            assert!(chain.overlay().edges.is_empty());
            assert!(chain.overlay().vertices.is_empty());
        }
    }

    #[test]
    fn remove_out_of_range() {
        let mut chain = chain_of(true, &[[0.0, 0.0, 0.0]]);
        assert_eq!(
            chain.remove_point(1).unwrap_err(),
            MeasureError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert_eq!(
            chain.move_point(3, Vec3::ONE).unwrap_err(),
            MeasureError::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn notifications_carry_copies() {
        let mut chain = MeasurementChain::default();
        let log = record(&mut chain);

        chain.add_point(Vec3::ZERO, None).unwrap();
        chain.move_point(0, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        chain.drop_point(0).unwrap();
        chain.remove_point(0).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ChainEvent::PointAdded {
                    index: 0,
                    position: Vec3::ZERO
                },
                ChainEvent::PointMoved {
                    index: 0,
                    position: Vec3::new(1.0, 2.0, 3.0)
                },
                ChainEvent::PointDropped { index: 0 },
                ChainEvent::PointRemoved {
                    index: 0,
                    position: Vec3::new(1.0, 2.0, 3.0)
                },
            ]
        );
    }

    #[test]
    fn config_edits_wait_for_refresh() {
        let mut chain = chain_of(false, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
        assert_eq!(chain.overlay().edges.len(), 2);

        chain.config_mut().closed = true;
        chain.config_mut().visibility.area = true;
        assert!(chain.is_dirty());
        assert_eq!(chain.overlay().edges.len(), 2);

        assert!(chain.refresh());
        assert!(!chain.refresh());
        assert_eq!(chain.overlay().edges.len(), 3);
        assert!(chain.overlay().area.as_ref().unwrap().label.visible);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut chain = chain_of(true, &[[0.0, 0.0, 0.0], [1.0, 0.0, 2.0], [1.0, 1.0, 0.0]]);
        let first = chain.overlay().clone();
        chain.recompute();
        chain.recompute();
        assert_eq!(chain.overlay(), &first);
    }

    #[test]
    fn apply_pick_copies_attributes() {
        let mut chain = chain_of(true, &[[0.0, 0.0, 0.0]]);
        let mut pick = PickResult {
            position: Vec3::new(5.0, 5.0, 1.0),
            ..default()
        };
        pick.attributes
            .insert("intensity".into(), serde_json::json!(42));

        chain.apply_pick(0, &pick).unwrap();

        let point = &chain.points()[0];
        assert_eq!(point.position, Vec3::new(5.0, 5.0, 1.0));
        assert_eq!(point.attributes["intensity"], serde_json::json!(42));
    }

    #[test]
    fn set_point_replaces_position_and_attributes() {
        let mut chain = chain_of(false, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let log = record(&mut chain);

        let mut point = MeasurePoint::new(Vec3::new(0.0, 2.0, 0.0));
        point
            .attributes
            .insert("classification".into(), serde_json::json!(2));
        chain.set_point(1, point).unwrap();

        assert_relative_eq!(chain.total_length(), 2.0);
        assert_eq!(chain.points()[1].attributes["classification"], serde_json::json!(2));
        assert!(matches!(
            log.lock().unwrap().last(),
            Some(ChainEvent::PointMoved { index: 1, .. })
        ));
        assert!(chain.set_point(2, MeasurePoint::new(Vec3::ZERO)).is_err());
    }
}

//! Annotation insertion gesture.
//!
//! A session owns at most one in-progress insertion: a single-point marker
//! that follows the cursor until a pointer release places it (left) or
//! abandons it (right). Either path, and the global `cancel_insertions`
//! broadcast, fire the same [`CancelToken`]; only the first firing tears the
//! marker down and unregisters its listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::events::{EventBus, NamedEvent, SubscriptionId};
use crate::measure::{ChainConfig, MeasurementChain, OverlayVisibility, PickResult};

/// Shared, idempotent cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Returns true only for the call that fired it.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Broadcast heard by every in-progress insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelInsertions;

impl NamedEvent for CancelInsertions {
    fn name(&self) -> &'static str {
        "cancel_insertions"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertionOptions {
    pub show_coordinates: bool,
    pub show_height: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
}

/// How a pointer release ended the gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InsertionOutcome {
    /// Marker placed; the annotation dialog should open for this position.
    Placed(Vec3),
    Cancelled,
    /// No insertion was in progress.
    Idle,
}

/// In-progress insertion: the cursor marker and its cancellation wiring.
#[derive(Debug)]
pub struct AnnotationInsertion {
    pub marker: MeasurementChain,
    token: CancelToken,
    subscription: SubscriptionId,
}

impl AnnotationInsertion {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn position(&self) -> Option<Vec3> {
        self.marker.points().first().map(|p| p.position)
    }
}

#[derive(Debug, Default)]
pub struct InsertionSession {
    broadcast: EventBus<CancelInsertions>,
    active: Option<AnnotationInsertion>,
}

impl InsertionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new insertion. Any insertion already running is cancelled first.
    pub fn start(&mut self, options: InsertionOptions) -> CancelToken {
        self.cancel_all();

        let mut marker = MeasurementChain::new(ChainConfig {
            closed: false,
            max_points: 1,
            visibility: OverlayVisibility {
                distances: false,
                coordinates: options.show_coordinates,
                height: options.show_height,
                ..default()
            },
            ..default()
        })
        .with_name("annotation_marker");
        // A one-point chain with room for one point cannot reject it.
        let _ = marker.add_point(Vec3::ZERO, None);

        let token = CancelToken::new();
        let listener_token = token.clone();
        let subscription = self.broadcast.subscribe("cancel_insertions", move |_| {
            listener_token.cancel();
        });

        self.active = Some(AnnotationInsertion {
            marker,
            token: token.clone(),
            subscription,
        });
        token
    }

    /// Broadcast `cancel_insertions`. Returns true if an insertion was torn down.
    pub fn cancel_all(&mut self) -> bool {
        self.broadcast.publish(&CancelInsertions);
        self.reap().is_some()
    }

    /// Tear down the active insertion once its token has fired.
    fn reap(&mut self) -> Option<AnnotationInsertion> {
        let fired = self
            .active
            .as_ref()
            .is_some_and(|insertion| insertion.token.is_cancelled());
        if !fired {
            return None;
        }
        let insertion = self.active.take()?;
        self.broadcast.unsubscribe(insertion.subscription);
        Some(insertion)
    }

    pub fn active(&self) -> Option<&AnnotationInsertion> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Listeners still registered for the broadcast.
    pub fn listener_count(&self) -> usize {
        self.broadcast.listener_count("cancel_insertions")
    }

    /// Move the marker under the cursor.
    pub fn drag_to(&mut self, pick: &PickResult) {
        if let Some(insertion) = self.active.as_mut() {
            let _ = insertion.marker.apply_pick(0, pick);
        }
    }

    /// Pointer release while inserting.
    pub fn release(&mut self, button: PointerButton) -> InsertionOutcome {
        let Some(insertion) = self.active.as_ref() else {
            return InsertionOutcome::Idle;
        };
        let outcome = match button {
            PointerButton::Left => insertion
                .position()
                .map_or(InsertionOutcome::Cancelled, InsertionOutcome::Placed),
            PointerButton::Right => InsertionOutcome::Cancelled,
        };
        insertion.token.cancel();
        self.reap();
        outcome
    }

    /// Pick up a token fired from outside the session (e.g. a held clone).
    pub fn poll(&mut self) -> bool {
        self.reap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(x: f32, y: f32, z: f32) -> PickResult {
        PickResult {
            position: Vec3::new(x, y, z),
            ..default()
        }
    }

    #[test]
    fn token_fires_once() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(token.cancel());
        assert!(!shared.cancel());
        assert!(!token.cancel());
        assert!(shared.is_cancelled());
    }

    #[test]
    fn left_release_places_marker() {
        let mut session = InsertionSession::new();
        session.start(InsertionOptions::default());
        session.drag_to(&pick(4.0, 5.0, 6.0));

        assert_eq!(
            session.release(PointerButton::Left),
            InsertionOutcome::Placed(Vec3::new(4.0, 5.0, 6.0))
        );
        assert!(!session.is_active());
        assert_eq!(session.listener_count(), 0);
    }

    #[test]
    fn right_release_cancels() {
        let mut session = InsertionSession::new();
        session.start(InsertionOptions::default());
        assert_eq!(session.release(PointerButton::Right), InsertionOutcome::Cancelled);
        assert_eq!(session.release(PointerButton::Right), InsertionOutcome::Idle);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut session = InsertionSession::new();
        let token = session.start(InsertionOptions::default());

        assert!(session.cancel_all());
        assert!(!session.cancel_all());
        assert!(!token.cancel());
        assert_eq!(session.listener_count(), 0);
        assert_eq!(session.release(PointerButton::Left), InsertionOutcome::Idle);
    }

    #[test]
    fn starting_again_cancels_the_previous_insertion() {
        let mut session = InsertionSession::new();
        let first = session.start(InsertionOptions::default());
        let second = session.start(InsertionOptions {
            show_coordinates: true,
            show_height: false,
        });

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(session.listener_count(), 1);
        let marker = &session.active().unwrap().marker;
        assert!(marker.config().visibility.coordinates);
        assert_eq!(marker.len(), 1);
    }

    #[test]
    fn externally_fired_token_is_reaped() {
        let mut session = InsertionSession::new();
        let token = session.start(InsertionOptions::default());
        assert!(!session.poll());
        token.cancel();
        assert!(session.poll());
        assert!(!session.poll());
        assert_eq!(session.listener_count(), 0);
    }
}

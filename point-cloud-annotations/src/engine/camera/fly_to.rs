//! Non-blocking camera fly-to.
//!
//! A flight is advanced by the frame clock; starting a new one replaces the
//! running flight rather than queueing behind it.

use bevy::prelude::*;
use constants::render_settings::FLY_TO_DURATION_SECS;

use super::viewport_camera::ViewportCamera;
use crate::annotation::{AnnotationId, ViewRecipe};

/// Eye position plus the point it looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn radius(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            target: self.target.lerp(other.target, t),
        }
    }
}

/// Quartic ease-out: fast start, gentle arrival.
pub fn ease_out_quartic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(4)
}

/// One camera transition between two poses.
#[derive(Debug, Clone, PartialEq)]
pub struct FlyTo {
    pub from: CameraPose,
    pub to: CameraPose,
    pub duration: f32,
    pub elapsed: f32,
    /// Annotation that requested the flight, if any.
    pub annotation: Option<AnnotationId>,
}

impl FlyTo {
    pub fn new(from: CameraPose, to: CameraPose, duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: 0.0,
            annotation: None,
        }
    }

    /// Flight from `current` to an annotation view recipe.
    ///
    /// A look-from recipe moves the eye to the recipe position while the look
    /// target travels from the point straight ahead (at the distance of the end
    /// target) to the end target. An orbit recipe keeps the view direction and
    /// backs off `radius` from the target.
    pub fn from_recipe(current: &CameraPose, recipe: &ViewRecipe, duration: f32) -> Self {
        let direction = current.direction();
        match *recipe {
            ViewRecipe::LookFrom { position, target } => {
                let ahead = current.position + direction * current.position.distance(target);
                Self::new(
                    CameraPose {
                        position: current.position,
                        target: ahead,
                    },
                    CameraPose { position, target },
                    duration,
                )
            }
            ViewRecipe::Orbit { target, radius } => Self::new(
                *current,
                CameraPose {
                    position: target - direction * radius,
                    target,
                },
                duration,
            ),
        }
    }

    pub fn with_annotation(mut self, annotation: AnnotationId) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn pose(&self) -> CameraPose {
        self.from.lerp(&self.to, ease_out_quartic(self.progress()))
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// Result of advancing the active flight by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightStep {
    pub pose: CameraPose,
    pub finished: bool,
    pub annotation: Option<AnnotationId>,
}

/// Holds at most one running flight.
#[derive(Resource, Debug, Default)]
pub struct CameraFlight {
    active: Option<FlyTo>,
}

impl CameraFlight {
    /// Begin `flight`, returning the flight it superseded.
    pub fn start(&mut self, flight: FlyTo) -> Option<FlyTo> {
        self.active.replace(flight)
    }

    pub fn cancel(&mut self) -> Option<FlyTo> {
        self.active.take()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&FlyTo> {
        self.active.as_ref()
    }

    /// Move the clock on by `dt` seconds. The flight is dropped once it lands.
    pub fn advance(&mut self, dt: f32) -> Option<FlightStep> {
        let flight = self.active.as_mut()?;
        flight.elapsed += dt;
        let step = FlightStep {
            pose: flight.pose(),
            finished: flight.is_finished(),
            annotation: flight.annotation,
        };
        if step.finished {
            self.active = None;
        }
        Some(step)
    }
}

/// Fired when a flight lands.
#[derive(Event, Debug, Clone, Copy)]
pub struct FlightFinished {
    pub annotation: Option<AnnotationId>,
}

/// Request to fly the viewport camera to a pose in render space.
#[derive(Event, Debug, Clone, Copy)]
pub struct FlyToRequest {
    pub recipe: ViewRecipe,
    pub annotation: Option<AnnotationId>,
}

pub fn start_camera_flights(
    mut requests: EventReader<FlyToRequest>,
    mut flight: ResMut<CameraFlight>,
    viewport_camera: Res<ViewportCamera>,
) {
    for request in requests.read() {
        let mut next = FlyTo::from_recipe(
            &viewport_camera.pose(),
            &request.recipe,
            FLY_TO_DURATION_SECS,
        );
        if let Some(annotation) = request.annotation {
            next = next.with_annotation(annotation);
        }
        if let Some(previous) = flight.start(next) {
            debug!(
                "Fly-to superseded at {:.0}%",
                previous.progress() * 100.0
            );
        }
    }
}

/// Drive the viewport camera along the active flight.
pub fn advance_camera_flight(
    mut flight: ResMut<CameraFlight>,
    mut viewport_camera: ResMut<ViewportCamera>,
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    mut finished: EventWriter<FlightFinished>,
    time: Res<Time>,
) {
    let Some(step) = flight.advance(time.delta_secs()) else {
        return;
    };

    viewport_camera.apply_pose(&step.pose);
    if let Ok(mut transform) = camera_query.single_mut() {
        *transform = viewport_camera.transform();
    }

    if step.finished {
        finished.write(FlightFinished {
            annotation: step.annotation,
        });
    }
}

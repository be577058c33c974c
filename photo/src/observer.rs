//! Progress events emitted while a panorama is assembled.

use crate::config::StitchAxis;
use std::sync::Mutex;

/// How one pair was merged.
#[derive(Debug, Clone, PartialEq)]
pub enum StitchDecision {
    Homography,
    FallbackConcat { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StitchEvent {
    RunStarted {
        images: usize,
    },
    FeaturesDetected {
        keypoints1: usize,
        keypoints2: usize,
    },
    MatchesFound {
        matches: usize,
        overlap: f64,
    },
    AxisResolved {
        axis: StitchAxis,
        /// `true` when inferred from the images, `false` when fixed or defaulted.
        detected: bool,
    },
    MergeCompleted {
        /// Index of the image just merged into the canvas.
        index: usize,
        decision: StitchDecision,
        width: u32,
        height: u32,
    },
    Cropped {
        width: u32,
        height: u32,
    },
}

/// Receives [`StitchEvent`]s. Implementations must not fail the run.
pub trait StitchObserver: Send + Sync {
    fn on_event(&self, event: &StitchEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StitchObserver for TracingObserver {
    fn on_event(&self, event: &StitchEvent) {
        match event {
            StitchEvent::RunStarted { images } => tracing::info!(images, "stitching started"),
            StitchEvent::FeaturesDetected {
                keypoints1,
                keypoints2,
            } => tracing::debug!(keypoints1, keypoints2, "features detected"),
            StitchEvent::MatchesFound { matches, overlap } => {
                tracing::debug!(matches, overlap, "matches found")
            }
            StitchEvent::AxisResolved { axis, detected } => {
                tracing::info!(axis = %axis, detected, "stitch axis resolved")
            }
            StitchEvent::MergeCompleted {
                index,
                decision,
                width,
                height,
            } => match decision {
                StitchDecision::Homography => {
                    tracing::info!(index, width, height, "merged via homography")
                }
                StitchDecision::FallbackConcat { reason } => {
                    tracing::info!(index, width, height, reason = %reason, "merged via concatenation")
                }
            },
            StitchEvent::Cropped { width, height } => tracing::info!(width, height, "black border cropped"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl StitchObserver for NullObserver {
    fn on_event(&self, _event: &StitchEvent) {}
}

/// Records events in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StitchEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StitchEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StitchObserver for RecordingObserver {
    fn on_event(&self, event: &StitchEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_order() {
        let obs = RecordingObserver::new();
        obs.on_event(&StitchEvent::RunStarted { images: 3 });
        obs.on_event(&StitchEvent::Cropped { width: 4, height: 5 });
        let events = obs.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StitchEvent::RunStarted { images: 3 });
    }

    #[test]
    fn tracing_observer_accepts_every_event() {
        let obs = TracingObserver;
        obs.on_event(&StitchEvent::AxisResolved {
            axis: StitchAxis::Vertical,
            detected: false,
        });
        obs.on_event(&StitchEvent::MergeCompleted {
            index: 1,
            decision: StitchDecision::FallbackConcat {
                reason: "no overlap".into(),
            },
            width: 10,
            height: 10,
        });
    }
}

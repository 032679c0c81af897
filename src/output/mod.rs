//! Result observers.
//!
//! Downstream consumers (drawing, publishing, recording) receive each
//! fetched result set through this interface. Notification is synchronous:
//! an observer finishes before the engine starts its next enqueue cycle.

use tracing::info;

use crate::results::{InferenceResult, ResultPayload};

/// Receives the fetched results of one inference unit.
///
/// Implementations must not assume anything about which model produced
/// the results beyond what the payload variants carry, and must not hold
/// on to the slice past the call.
pub trait ResultObserver {
    /// `source` is the name of the inference unit the results came from.
    fn observe(&mut self, results: &[InferenceResult], source: &str);
}

/// Observer that logs every result.
#[derive(Debug, Default)]
pub struct LogObserver;

impl ResultObserver for LogObserver {
    fn observe(&mut self, results: &[InferenceResult], source: &str) {
        for result in results {
            let location = result.location();
            match result.payload() {
                ResultPayload::Face { confidence } => {
                    info!(
                        source,
                        x = location.x,
                        y = location.y,
                        width = location.width,
                        height = location.height,
                        confidence,
                        "face"
                    );
                }
                ResultPayload::LicensePlate { text } => {
                    info!(source, x = location.x, y = location.y, plate = %text, "license plate");
                }
                ResultPayload::VehicleAttributes {
                    color,
                    vehicle_type,
                    ..
                } => {
                    info!(source, x = location.x, y = location.y, color, vehicle_type, "vehicle");
                }
            }
        }
    }
}

/// Observer that keeps the most recently observed result set.
///
/// Useful as a bridge to consumers that poll instead of subscribing.
#[derive(Debug, Default)]
pub struct LatestObserver {
    results: Vec<InferenceResult>,
    source: Option<String>,
}

impl LatestObserver {
    pub fn results(&self) -> &[InferenceResult] {
        &self.results
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl ResultObserver for LatestObserver {
    fn observe(&mut self, results: &[InferenceResult], source: &str) {
        self.results = results.to_vec();
        self.source = Some(source.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Rect;

    #[test]
    fn test_latest_observer_replaces_results() {
        let mut observer = LatestObserver::default();
        let first = vec![InferenceResult::new(
            Rect::new(0, 0, 10, 10),
            ResultPayload::Face { confidence: 0.9 },
        )];
        observer.observe(&first, "faces");
        assert_eq!(observer.results().len(), 1);
        assert_eq!(observer.source(), Some("faces"));

        observer.observe(&[], "faces");
        assert!(observer.results().is_empty());
    }
}

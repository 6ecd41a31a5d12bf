//! Detection adapter boundary.
//!
//! The vision model lives outside this workspace; callers hand the
//! bridge a list of classified anomalies. `Detector` is the seam for
//! wiring a real model service in, and `FixtureDetector` stands in for
//! it in tests and offline runs.

use cvr_core::WorkflowResult;
use serde::{Deserialize, Serialize};

/// One classified anomaly from the vision model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub class: String,
    pub confidence: f64,
}

pub trait Detector: Send + Sync {
    /// Classify an image. An empty list is a legitimate negative result
    /// (no anomaly), not an error.
    fn detect(&self, image: &[u8]) -> WorkflowResult<Vec<Detection>>;
}

/// Returns canned detections regardless of input.
#[derive(Clone, Debug, Default)]
pub struct FixtureDetector {
    pub detections: Vec<Detection>,
}

impl FixtureDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Detector for FixtureDetector {
    fn detect(&self, _image: &[u8]) -> WorkflowResult<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

/// Pick the detection with maximum confidence; ties keep the first-seen
/// entry. `None` only for an empty list.
pub fn top_detection(detections: &[Detection]) -> Option<&Detection> {
    let mut best: Option<&Detection> = None;
    for d in detections {
        match best {
            Some(b) if d.confidence <= b.confidence => {}
            _ => best = Some(d),
        }
    }
    best
}

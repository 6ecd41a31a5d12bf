use cvr_core::{Incident, Location, ReportSource, WorkflowResult};
use cvr_detect::{top_detection, Detection};
use tracing::info;

use crate::engine::{Engine, NewReport};

/// Context the camera node supplies with every frame: its identity and
/// the location the frame was taken at.
#[derive(Clone, Debug)]
pub struct ReporterContext {
    pub node: String,
    pub location: Location,
}

/// Turns vision-model output into incidents without human initiation.
/// An empty detection list is a clean negative; otherwise exactly one
/// incident is created from the top-confidence class.
pub struct AutoReportBridge<'a> {
    engine: &'a Engine,
    min_confidence: Option<f64>,
}

impl<'a> AutoReportBridge<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            min_confidence: None,
        }
    }

    /// Apply an explicit confidence floor. Without one, any non-empty
    /// detection list produces an incident, however low the confidence.
    pub fn with_min_confidence(engine: &'a Engine, min_confidence: Option<f64>) -> Self {
        Self {
            engine,
            min_confidence,
        }
    }

    pub fn ingest(
        &self,
        image: &[u8],
        ext: &str,
        detections: &[Detection],
        ctx: &ReporterContext,
    ) -> WorkflowResult<Option<Incident>> {
        let Some(top) = top_detection(detections) else {
            info!(node = %ctx.node, "no anomaly detected");
            return Ok(None);
        };
        if let Some(min) = self.min_confidence {
            if top.confidence < min {
                info!(
                    node = %ctx.node,
                    class = %top.class,
                    confidence = top.confidence,
                    "top detection below configured floor"
                );
                return Ok(None);
            }
        }

        let incident = self.engine.submit_report(NewReport {
            category: top.class.clone(),
            location: ctx.location.clone(),
            image: image.to_vec(),
            ext: ext.to_string(),
            source: ReportSource::Camera {
                node: ctx.node.clone(),
            },
        })?;
        info!(
            id = %incident.id,
            class = %top.class,
            confidence = top.confidence,
            "auto-reported incident"
        );
        Ok(Some(incident))
    }
}

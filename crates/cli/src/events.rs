//! Generation telemetry written to the log stream.

use async_trait::async_trait;
use pipeline::{EventSinkError, GenerationEvent, GenerationEventSink};
use tracing::info;

/// Emits each [`GenerationEvent`] as one structured log line on the
/// `questgen::telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl GenerationEventSink for TracingEventSink {
    async fn record(&self, event: GenerationEvent) -> Result<(), EventSinkError> {
        let payload =
            serde_json::to_string(&event).map_err(|e| EventSinkError(e.to_string()))?;
        info!(
            target: "questgen::telemetry",
            run_id = %event.run_id,
            user_id = %event.user_id,
            event = %payload,
            "generation event"
        );
        Ok(())
    }
}

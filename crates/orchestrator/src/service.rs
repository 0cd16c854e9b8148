//! Request-level control flow: parameter checks, quota admission,
//! generation and telemetry.

use std::sync::Arc;

use pipeline::{
    GeneratedDraft, GenerationError, GenerationEvent, GenerationEventSink, GenerationOutcome,
    GenerationParams, GenerationRunId, QuotaConfig, QuotaDecision, QuotaGate, QuotaKey, Timestamp,
    UserId,
};
use tracing::{field, info, instrument, warn, Span};

use crate::generator::ActivityGenerator;

/// Quota scope for the per-minute generation window.
pub const MINUTE_SCOPE: &str = "gen:minute";

/// Quota scope for the per-hour generation window.
pub const HOUR_SCOPE: &str = "gen:hour";

/// Admits, generates and reports one activity draft per call.
pub struct GenerationService {
    generator: ActivityGenerator,
    quota: Arc<QuotaGate>,
    per_minute: QuotaConfig,
    per_hour: QuotaConfig,
    events: Option<Arc<dyn GenerationEventSink>>,
}

impl GenerationService {
    /// A service using the generation quota presets.
    pub fn new(generator: ActivityGenerator, quota: Arc<QuotaGate>) -> Self {
        Self {
            generator,
            quota,
            per_minute: QuotaConfig::generation_per_minute(),
            per_hour: QuotaConfig::generation_per_hour(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_quotas(mut self, per_minute: QuotaConfig, per_hour: QuotaConfig) -> Self {
        self.per_minute = per_minute;
        self.per_hour = per_hour;
        self
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn GenerationEventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Generates a draft for `user`.
    ///
    /// Invalid parameters and quota rejections fail before any provider
    /// call. Failures after admission are reported to the event sink and
    /// returned unchanged.
    #[instrument(skip(self, params), fields(user = %user, run_id = field::Empty))]
    pub async fn generate(
        &self,
        user: &UserId,
        params: GenerationParams,
    ) -> Result<GeneratedDraft, GenerationError> {
        params.validate()?;
        self.admit(user)?;

        let run_id = GenerationRunId::new_random();
        Span::current().record("run_id", field::display(run_id));

        let result = self.generator.generate(&params).await;
        let outcome = match &result {
            Ok(_) => {
                info!("draft generated");
                GenerationOutcome::Generated
            }
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "generation failed");
                GenerationOutcome::GenerationFailed { kind: err.kind() }
            }
        };

        self.record(GenerationEvent {
            run_id,
            user_id: user.clone(),
            params,
            outcome,
            occurred_at: Timestamp::now(),
        })
        .await;

        result
    }

    /// Minute window first, then hour window; a rejection in either stops
    /// the request.
    fn admit(&self, user: &UserId) -> Result<(), GenerationError> {
        for (scope, config) in [(MINUTE_SCOPE, self.per_minute), (HOUR_SCOPE, self.per_hour)] {
            let key = QuotaKey::scoped(user, scope);
            if let QuotaDecision::Rejected {
                retry_after_seconds,
            } = self.quota.admit(&key, config)
            {
                warn!(key = %key, retry_after_seconds, "generation quota exceeded");
                return Err(GenerationError::QuotaExceeded {
                    retry_after_seconds,
                });
            }
        }
        Ok(())
    }

    async fn record(&self, event: GenerationEvent) {
        let Some(sink) = &self.events else {
            return;
        };
        if let Err(e) = sink.record(event).await {
            warn!(error = %e, "failed to record generation event");
        }
    }
}

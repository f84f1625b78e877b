use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::completion::Metrics;

/// Phase-specific context carried on a record (model, prompt name, parameter
/// under test, ...). Kept as an open map because each phase attaches
/// different fields; failures must carry enough of it to diagnose a call
/// without re-running.
pub type RecordContext = Map<String, Value>;

/// Outcome of a single call within an experiment phase. Records are
/// append-only for the lifetime of a run and serialized in insertion order,
/// which is chronological call order.
#[derive(Debug, Clone)]
pub enum ExperimentRecord {
    Success {
        experiment: String,
        context: RecordContext,
        response: Option<String>,
        metrics: Option<Metrics>,
        timestamp: DateTime<Utc>,
    },
    Failure {
        experiment: String,
        context: RecordContext,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Records serialize as one flat map: `experiment`, the context fields, then
/// the outcome. Failures are distinguished by the `error` key, the shape the
/// output document has always had.
impl Serialize for ExperimentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Self::Success {
                experiment,
                context,
                response,
                metrics,
                timestamp,
            } => {
                map.serialize_entry("experiment", experiment)?;
                for (key, value) in context {
                    map.serialize_entry(key, value)?;
                }
                if let Some(response) = response {
                    map.serialize_entry("response", response)?;
                }
                if let Some(metrics) = metrics {
                    map.serialize_entry("metrics", metrics)?;
                }
                map.serialize_entry("timestamp", timestamp)?;
            }
            Self::Failure {
                experiment,
                context,
                error,
                timestamp,
            } => {
                map.serialize_entry("experiment", experiment)?;
                for (key, value) in context {
                    map.serialize_entry(key, value)?;
                }
                map.serialize_entry("error", error)?;
                map.serialize_entry("timestamp", timestamp)?;
            }
        }
        map.end()
    }
}

impl ExperimentRecord {
    pub fn success(
        experiment: impl Into<String>,
        context: RecordContext,
        response: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self::Success {
            experiment: experiment.into(),
            context,
            response: Some(response.into()),
            metrics: Some(metrics),
            timestamp: Utc::now(),
        }
    }

    /// A success record that summarizes a batch rather than a single
    /// response (e.g. the aggregate timing row of the performance phase).
    pub fn summary(experiment: impl Into<String>, context: RecordContext) -> Self {
        Self::Success {
            experiment: experiment.into(),
            context,
            response: None,
            metrics: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        experiment: impl Into<String>,
        context: RecordContext,
        error: impl Into<String>,
    ) -> Self {
        Self::Failure {
            experiment: experiment.into(),
            context,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn experiment(&self) -> &str {
        match self {
            Self::Success { experiment, .. } | Self::Failure { experiment, .. } => experiment,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Per-phase success/failure tally produced by `ExperimentRunner::summarize`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTally {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Snapshot of a whole run, constructed once at save time.
#[derive(Debug, Serialize)]
pub struct ResultsAggregate<'a> {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_experiments: usize,
    pub results: &'a [ExperimentRecord],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(model: &str) -> RecordContext {
        let mut ctx = RecordContext::new();
        ctx.insert("model".into(), Value::String(model.into()));
        ctx
    }

    #[test]
    fn success_serializes_flat_context() {
        let record = ExperimentRecord::success(
            "phase_a",
            context("gpt-4o-mini"),
            "hello",
            Metrics {
                latency_ms: 1.0,
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["experiment"], "phase_a");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["response"], "hello");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_serializes_error_key() {
        let record = ExperimentRecord::failure("phase_a", context("m"), "HTTP 500: boom");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["error"], "HTTP 500: boom");
        assert!(json.get("response").is_none());
        assert!(record.is_failure());
    }

    #[test]
    fn summary_omits_response_and_metrics() {
        let record = ExperimentRecord::summary("perf", RecordContext::new());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("response").is_none());
        assert!(json.get("metrics").is_none());
        assert!(!record.is_failure());
    }
}

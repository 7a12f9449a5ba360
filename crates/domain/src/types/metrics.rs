//! Metric record for one completed external call
//!
//! A record is created exactly once, when a timer completes or fails, and
//! is never mutated afterwards. Its duration is derived from the start and
//! end timestamps and clamped so it is never negative. Deserialized records
//! go through the same normalization as constructed ones.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

/// Caller-supplied context attached to a metric
pub type Metadata = HashMap<String, serde_json::Value>;

/// Immutable fact: one completed operation's timing, outcome and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase", from = "RawMetricRecord")]
pub struct MetricRecord {
    id: Uuid,
    operation: String,
    service: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    duration: Duration,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

impl MetricRecord {
    /// Record a successful operation
    pub fn success(
        operation: impl Into<String>,
        service: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        metadata: Metadata,
    ) -> Self {
        Self::build(
            Uuid::now_v7(),
            operation.into(),
            service.into(),
            start_time,
            end_time,
            None,
            metadata,
        )
    }

    /// Record a failed operation with the caller's error description
    pub fn failure(
        operation: impl Into<String>,
        service: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error_message: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self::build(
            Uuid::now_v7(),
            operation.into(),
            service.into(),
            start_time,
            end_time,
            Some(error_message.into()),
            metadata,
        )
    }

    fn build(
        id: Uuid,
        operation: String,
        service: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error_message: Option<String>,
        metadata: Metadata,
    ) -> Self {
        // A misordered clock must not produce a negative span.
        let end_time = end_time.max(start_time);
        let duration = (end_time - start_time).to_std().unwrap_or(Duration::ZERO);

        Self {
            id,
            operation,
            service,
            start_time,
            end_time,
            duration,
            success: error_message.is_none(),
            error_message,
            metadata,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Duration in fractional milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1_000_000.0
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Present iff the operation failed
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Wire form accepted when deserializing a [`MetricRecord`]
///
/// `durationMs` is ignored and recomputed from the timestamps. An error
/// message always marks the record failed; a failed record without one
/// gets [`UNSPECIFIED_ERROR`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetricRecord {
    id: Uuid,
    operation: String,
    service: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

/// Error message given to failed records that arrive without one
pub const UNSPECIFIED_ERROR: &str = "unspecified error";

fn default_success() -> bool {
    true
}

impl From<RawMetricRecord> for MetricRecord {
    fn from(raw: RawMetricRecord) -> Self {
        let error_message = match (raw.success, raw.error_message) {
            (_, Some(message)) => Some(message),
            (false, None) => Some(UNSPECIFIED_ERROR.to_string()),
            (true, None) => None,
        };
        Self::build(
            raw.id,
            raw.operation,
            raw.service,
            raw.start_time,
            raw.end_time,
            error_message,
            raw.metadata,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_success_record_has_no_error() {
        let record = MetricRecord::success("embedding", "ai_inference", at(0), at(250), Metadata::new());

        assert!(record.is_success());
        assert_eq!(record.error_message(), None);
        assert_eq!(record.duration(), Duration::from_millis(250));
        assert_eq!(record.duration_ms(), 250.0);
    }

    #[test]
    fn test_failure_record_carries_error() {
        let record = MetricRecord::failure(
            "vision_analysis",
            "ai_inference",
            at(1_000),
            at(1_400),
            "rate limited",
            Metadata::new(),
        );

        assert!(!record.is_success());
        assert_eq!(record.error_message(), Some("rate limited"));
        assert_eq!(record.duration(), Duration::from_millis(400));
    }

    /// Validates that an end time before the start time is clamped.
    ///
    /// Assertions:
    /// - Duration is zero, never negative.
    /// - End time equals start time.
    #[test]
    fn test_misordered_clock_is_clamped() {
        let record = MetricRecord::success("lookup", "search", at(5_000), at(4_000), Metadata::new());
        assert_eq!(record.duration(), Duration::ZERO);
        assert_eq!(record.end_time(), record.start_time());
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut metadata = Metadata::new();
        metadata.insert("model".into(), json!("gpt-4o-mini"));
        let record = MetricRecord::success("completion", "openai", at(0), at(1_500), metadata);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["durationMs"], 1_500);
        assert_eq!(value["service"], "openai");
        assert_eq!(value["metadata"]["model"], "gpt-4o-mini");
        assert!(value.get("errorMessage").is_none());
        assert!(value.get("startTime").is_some());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = MetricRecord::success("lookup", "search", at(0), at(1), Metadata::new());
        let b = MetricRecord::success("lookup", "search", at(0), at(1), Metadata::new());
        assert_ne!(a.id(), b.id());
    }

    /// Validates deserialization restores the record invariants.
    ///
    /// Assertions:
    /// - A reversed span is clamped and the stated duration is ignored.
    /// - A failed record without a message gets a placeholder message.
    /// - A record carrying an error message is treated as failed.
    /// - The id survives the round trip.
    #[test]
    fn test_deserialize_normalizes_inconsistent_records() {
        let reversed: MetricRecord = serde_json::from_value(json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "operation": "lookup",
            "service": "nutrition_db",
            "startTime": "2024-01-01T00:00:10Z",
            "endTime": "2024-01-01T00:00:00Z",
            "durationMs": 999_999,
            "success": false
        }))
        .unwrap();

        assert!(!reversed.is_success());
        assert_eq!(reversed.error_message(), Some(UNSPECIFIED_ERROR));
        assert_eq!(reversed.end_time(), reversed.start_time());
        assert_eq!(reversed.duration(), Duration::ZERO);
        assert_eq!(reversed.id().to_string(), "01890a5d-ac96-774b-bcce-b302099a8057");

        let contradictory: MetricRecord = serde_json::from_value(json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8058",
            "operation": "embedding",
            "service": "ai_inference",
            "startTime": "2024-01-01T00:00:00Z",
            "endTime": "2024-01-01T00:00:01.500Z",
            "durationMs": 7,
            "success": true,
            "errorMessage": "boom"
        }))
        .unwrap();

        assert!(!contradictory.is_success());
        assert_eq!(contradictory.error_message(), Some("boom"));
        assert_eq!(contradictory.duration(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_serialized_record_deserializes_equal() {
        let record =
            MetricRecord::failure("vision", "ai_inference", at(0), at(80), "timeout", Metadata::new());
        let back: MetricRecord = serde_json::to_value(&record).and_then(serde_json::from_value).unwrap();
        assert_eq!(back, record);
    }
}

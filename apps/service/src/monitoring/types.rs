use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Fixed message recorded for a URI that is not a valid URL
pub const INVALID_URI_MESSAGE: &str = "invalid URI, request was not sent";

/// Fixed message recorded when the request could not be completed
pub const NETWORK_ERROR_MESSAGE: &str = "network error, endpoint unreachable";

/// How a probe ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    NetworkError,
    InvalidUri,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::NetworkError => write!(f, "network error"),
            OutcomeKind::InvalidUri => write!(f, "invalid uri"),
        }
    }
}

/// Result of one probe, serialized as a snapshot entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    /// URI that was probed
    pub uri: String,

    /// HTTP status code (successful transport only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Time until response headers arrived, written in milliseconds
    #[serde(
        rename = "responseTime",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_millis"
    )]
    pub latency: Option<Duration>,

    /// Human-readable failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip)]
    pub kind: OutcomeKind,
}

impl ProbeOutcome {
    pub fn success(uri: impl Into<String>, status_code: u16, latency: Duration) -> Self {
        Self {
            uri: uri.into(),
            status_code: Some(status_code),
            latency: Some(latency),
            message: None,
            kind: OutcomeKind::Success,
        }
    }

    pub fn network_error(uri: impl Into<String>) -> Self {
        Self::failure(uri, OutcomeKind::NetworkError, NETWORK_ERROR_MESSAGE)
    }

    pub fn invalid_uri(uri: impl Into<String>) -> Self {
        Self::failure(uri, OutcomeKind::InvalidUri, INVALID_URI_MESSAGE)
    }

    fn failure(uri: impl Into<String>, kind: OutcomeKind, message: &str) -> Self {
        Self {
            uri: uri.into(),
            status_code: None,
            latency: None,
            message: Some(message.to_owned()),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

fn serialize_millis<S: Serializer>(latency: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match latency {
        Some(latency) => serializer.serialize_u64(latency.as_millis() as u64),
        None => serializer.serialize_none(),
    }
}

/// Every outcome of one poll cycle, in registry order
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Local>,
    pub outcomes: Vec<ProbeOutcome>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Local>, outcomes: Vec<ProbeOutcome>) -> Self {
        Self { taken_at, outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of outcomes that are not [`OutcomeKind::Success`]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_serializes_code_and_latency() {
        let outcome = ProbeOutcome::success("https://a.example", 200, Duration::from_millis(42));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"uri": "https://a.example", "statusCode": 200, "responseTime": 42})
        );
    }

    #[test]
    fn test_failures_serialize_message_only() {
        let outcome = ProbeOutcome::network_error("https://down.example");
        assert_eq!(outcome.kind, OutcomeKind::NetworkError);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"uri": "https://down.example", "message": NETWORK_ERROR_MESSAGE})
        );

        let outcome = ProbeOutcome::invalid_uri("::nope");
        assert_eq!(outcome.kind, OutcomeKind::InvalidUri);
        assert_eq!(outcome.message.as_deref(), Some(INVALID_URI_MESSAGE));
        assert!(outcome.status_code.is_none());
    }

    #[test]
    fn test_snapshot_counts_failures() {
        let snapshot = Snapshot::new(
            Local::now(),
            vec![
                ProbeOutcome::success("a", 503, Duration::from_millis(1)),
                ProbeOutcome::network_error("b"),
                ProbeOutcome::invalid_uri("c"),
            ],
        );
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.failures(), 2);
    }
}

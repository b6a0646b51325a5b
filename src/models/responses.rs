//! Response DTOs for the host API
//!
//! Defines the structure of outgoing control endpoint bodies.

use serde::Serialize;

use crate::worker::{UpdateOutcome, WorkerId, WorkerMessage};

/// Response body for POST /__sw/message
///
/// Either the worker's reply or an acknowledgement for fire-and-forget
/// messages.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageResponse {
    Reply(WorkerMessage),
    Accepted { accepted: bool },
}

impl MessageResponse {
    /// Wraps an optional worker reply.
    pub fn from_reply(reply: Option<WorkerMessage>) -> Self {
        match reply {
            Some(message) => MessageResponse::Reply(message),
            None => MessageResponse::Accepted { accepted: true },
        }
    }
}

/// Response body for POST /__sw/update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    /// "unchanged", "waiting" or "activated"
    pub outcome: String,
    /// Worker installed by this update, if any
    pub worker: Option<WorkerId>,
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        let (outcome, worker) = match outcome {
            UpdateOutcome::Unchanged => ("unchanged", None),
            UpdateOutcome::Waiting(id) => ("waiting", Some(id)),
            UpdateOutcome::Activated(id) => ("activated", Some(id)),
        };
        Self {
            outcome: outcome.to_string(),
            worker,
        }
    }
}

/// Response body for GET /__sw/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_reply_serialize() {
        let resp = MessageResponse::from_reply(Some(WorkerMessage::UpdateAvailable {
            version: "ghioastral-v1.0.0".to_string(),
        }));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "UPDATE_AVAILABLE");
        assert_eq!(json["version"], "ghioastral-v1.0.0");
    }

    #[test]
    fn test_message_accepted_serialize() {
        let resp = MessageResponse::from_reply(None);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"accepted":true}"#);
    }

    #[test]
    fn test_update_response_from_outcome() {
        let resp = UpdateResponse::from(UpdateOutcome::Waiting(3));
        assert_eq!(resp.outcome, "waiting");
        assert_eq!(resp.worker, Some(3));

        let resp = UpdateResponse::from(UpdateOutcome::Unchanged);
        assert_eq!(resp.outcome, "unchanged");
        assert!(resp.worker.is_none());
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}

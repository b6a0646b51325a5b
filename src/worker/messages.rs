//! Control channel messages exchanged with controlled pages.

use serde::{Deserialize, Serialize};

/// Message posted by a page to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate the waiting worker without waiting for pages to close
    SkipWaiting,
    /// Run the dynamic cache eviction sweep
    CleanCache,
    /// Ask for the current version identifier
    CheckUpdate,
}

/// Message sent by the worker to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    UpdateAvailable { version: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ClientMessage::SkipWaiting);

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"CLEAN_CACHE"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CleanCache);

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"CHECK_UPDATE"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CheckUpdate);
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"REBOOT"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{}"#).is_err());
    }

    #[test]
    fn test_update_available_wire_format() {
        let msg = WorkerMessage::UpdateAvailable {
            version: "ghioastral-v1.0.0".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({"type": "UPDATE_AVAILABLE", "version": "ghioastral-v1.0.0"})
        );
    }
}

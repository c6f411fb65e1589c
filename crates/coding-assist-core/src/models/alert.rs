//! Operator-facing alerts.

use coding_assist_api::WireAlert;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single alert, whatever shape the source used for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertMessage {
    /// Text shown to the operator
    pub message: String,
    /// Extra fields from structured alerts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AlertMessage {
    /// Plain-text alert without metadata.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: None,
        }
    }
}

impl From<WireAlert> for AlertMessage {
    fn from(alert: WireAlert) -> Self {
        let (message, metadata) = alert.into_parts();
        Self { message, metadata }
    }
}

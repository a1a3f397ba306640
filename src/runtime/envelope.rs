use serde::{Deserialize, Serialize};

use super::handle::{Outcome, RuntimeError};

/// `{status, message, payload}` reply for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// HTTP-style status code.
    pub status: u16,
    /// Human-readable summary.
    pub message: String,
    /// Operation result, `null` on failure.
    pub payload: serde_json::Value,
}

impl Reply {
    /// Builds the envelope for an operation result.
    pub fn from_result(result: Result<Outcome, RuntimeError>) -> Self {
        match result {
            Ok(outcome) => match serde_json::to_value(&outcome) {
                Ok(payload) => Self {
                    status: 200,
                    message: "ok".to_string(),
                    payload,
                },
                Err(err) => Self::failure(500, format!("serialization error: {err}")),
            },
            Err(err) => Self::failure(err.status(), err.to_string()),
        }
    }

    fn failure(status: u16, message: String) -> Self {
        Self {
            status,
            message,
            payload: serde_json::Value::Null,
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};
use strum::Display;
use tokio_tungstenite::tungstenite;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a failure, carried in results that cross the library boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    Transport,
    Protocol,
    Validation,
    EmptyResult,
    Cancelled,
}

/// Errors produced while talking to the server manager.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced an answer: connection refused, timeout, gateway failure.
    #[error("transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// An answer arrived but did not have the expected shape.
    #[error("malformed response: {reason}")]
    Protocol {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The backend understood the request and refused it.
    #[error("request rejected: {reason}")]
    Validation { reason: String },

    /// The backend answered successfully without anything usable in it.
    #[error("empty result: {reason}")]
    EmptyResult { reason: String },

    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn transport(reason: impl ToString) -> Self {
        Self::Transport {
            reason: reason.to_string(),
            source: None,
        }
    }

    pub fn protocol(reason: impl ToString) -> Self {
        Self::Protocol {
            reason: reason.to_string(),
            source: None,
        }
    }

    pub fn validation(reason: impl ToString) -> Self {
        Self::Validation {
            reason: reason.to_string(),
        }
    }

    pub fn empty(reason: impl ToString) -> Self {
        Self::EmptyResult {
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport { .. } => ErrorKind::Transport,
            ClientError::Protocol { .. } => ErrorKind::Protocol,
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::EmptyResult { .. } => ErrorKind::EmptyResult,
            ClientError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Connection, timeout and protocol failures say nothing about the command itself, so another
    /// route may still succeed. A rejection or a cancellation would fail the same way twice.
    pub fn warrants_fallback(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Protocol)
    }

    /// Classify a non-success HTTP status. Server side failures mean the manager could not reach
    /// the game server; client errors are the manager refusing the request.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = error_detail(body);
        let reason = match detail {
            Some(detail) => format!("{status}: {detail}"),
            None => status.to_string(),
        };
        let unreachable = (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
            || status == StatusCode::REQUEST_TIMEOUT;
        if unreachable {
            Self::transport(reason)
        } else {
            Self::validation(reason)
        }
    }
}

/// Pulls the human readable part out of a `{"message": ..}` or `{"error": ..}` error body.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(|v| v.as_str()))
            .map(ToString::to_string),
        Err(_) => Some(body.chars().take(200).collect()),
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Protocol {
                reason: err.to_string(),
                source: Some(Box::new(err)),
            };
        }
        if let Some(status) = err.status() {
            return Self::from_status(status, "");
        }
        if err.is_builder() {
            return Self::validation(err);
        }
        Self::Transport {
            reason: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol {
            reason: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        use tungstenite::Error;
        match err {
            Error::Url(_) => Self::validation(err),
            Error::Http(ref response) => {
                let body = response
                    .body()
                    .as_deref()
                    .map(String::from_utf8_lossy)
                    .unwrap_or_default()
                    .to_string();
                Self::from_status(response.status(), &body)
            }
            Error::ConnectionClosed | Error::AlreadyClosed | Error::Io(_) | Error::HttpFormat(_) => {
                Self::Transport {
                    reason: err.to_string(),
                    source: Some(Box::new(err)),
                }
            }
            _ => Self::Protocol {
                reason: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

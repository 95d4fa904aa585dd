use crate::{
    error::{
        ClientError,
        ErrorKind,
    },
    transport::{
        RconResponse,
        RconRoute,
    },
};
use serde::{
    Deserialize,
    Serialize,
};

/// Outcome of one dispatched command. Failures are values, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub response: Option<String>,
    pub cached: bool,
    /// Route that produced this result, absent when nothing was sent.
    pub transport: Option<RconRoute>,
    pub fell_back: bool,
    pub error_kind: Option<ErrorKind>,
}

impl CommandResult {
    pub(crate) fn from_response(route: RconRoute, response: RconResponse, fell_back: bool) -> Self {
        let error_kind = (!response.success).then_some(ErrorKind::Validation);
        Self {
            success: response.success,
            message: response.message,
            response: response.response,
            cached: response.cached.unwrap_or(false),
            transport: Some(route),
            fell_back,
            error_kind,
        }
    }

    pub(crate) fn from_error(route: Option<RconRoute>, err: &ClientError, fell_back: bool) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            response: None,
            cached: false,
            transport: route,
            fell_back,
            error_kind: Some(err.kind()),
        }
    }

    /// Nothing reached the game server.
    pub fn is_transport_failure(&self) -> bool {
        self.error_kind == Some(ErrorKind::Transport)
    }

    /// The text worth showing to an operator: the command output if any, otherwise the message.
    pub fn output(&self) -> &str {
        match self.response.as_deref() {
            Some(response) if !response.trim().is_empty() => response,
            _ => &self.message,
        }
    }
}

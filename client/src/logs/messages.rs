use chrono::{
    DateTime,
    Utc,
};
use derive_more::Display;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    convert::Infallible,
    str::FromStr,
};

/// Name reserved for the live container/service output.
pub const CONTAINER_CHANNEL: &str = "container";

/// The log channel a session is subscribed to.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Display)]
pub enum LogChannel {
    #[default]
    #[display("container")]
    Container,
    #[display("{_0}")]
    File(String),
}

impl LogChannel {
    /// `None`, blank names and the reserved name select the container stream.
    pub fn named(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            None | Some("") | Some(CONTAINER_CHANNEL) => LogChannel::Container,
            Some(file) => LogChannel::File(file.to_string()),
        }
    }

    pub(crate) fn subscribe_frame(&self) -> ClientFrame {
        match self {
            LogChannel::Container => ClientFrame::StartContainerLogs,
            LogChannel::File(file) => ClientFrame::StartArkLogs { file: file.clone() },
        }
    }
}

impl FromStr for LogChannel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::named(Some(s)))
    }
}

/// One log line as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub message: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl LogEntry {
    pub fn new(level: impl ToString, message: impl ToString) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.to_string(),
        }
    }
}

/// Which stream a buffered message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[display("container")]
    Container,
    #[display("ark")]
    Ark,
    #[display("system")]
    System,
}

/// A message in the subscriber visible buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub kind: LogKind,
    #[serde(flatten)]
    pub entry: LogEntry,
}

/// A line from a log file, tagged with the file it came from when the backend says so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArkLogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorFrame {
    Message { message: String },
    Text(String),
}

impl ErrorFrame {
    pub fn message(&self) -> &str {
        match self {
            ErrorFrame::Message { message } | ErrorFrame::Text(message) => message,
        }
    }
}

/// Frames pushed by the log stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerFrame {
    #[display("container-log")]
    ContainerLog(LogEntry),
    #[display("ark-log")]
    ArkLog(ArkLogEntry),
    #[display("system-log")]
    SystemLog(LogEntry),
    #[display("error: {}", _0.message())]
    Error(ErrorFrame),
}

/// Frames sent to the log stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    #[display("start-container-logs")]
    StartContainerLogs,
    #[display("start-ark-logs {file}")]
    StartArkLogs { file: String },
    #[display("stop-logs")]
    StopLogs,
}

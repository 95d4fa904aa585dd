use crate::parser::{
    DEFAULT_DAY,
    UNKNOWN_TIME,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use strum::Display;

pub const STATUS_ONLINE: &str = "Online";
pub const STATUS_UNAVAILABLE: &str = "Unavailable";

/// Which path produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatsSource {
    Structured,
    Rcon,
    Unavailable,
}

/// Live status of one server at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatsSnapshot {
    pub players: u32,
    pub current_day: u32,
    pub current_time: String,
    pub version: Option<String>,
    pub map: Option<String>,
    pub cached: bool,
    pub error: Option<String>,
    /// Human readable health, e.g. `Partial data (1 RCON error)`.
    pub status: String,
    pub source: StatsSource,
    /// Failures of individual fallback commands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rcon_errors: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl LiveStatsSnapshot {
    /// All fields defaulted, `error` set.
    pub fn unavailable(error: impl ToString) -> Self {
        Self {
            players: 0,
            current_day: DEFAULT_DAY,
            current_time: UNKNOWN_TIME.to_string(),
            version: None,
            map: None,
            cached: false,
            error: Some(error.to_string()),
            status: STATUS_UNAVAILABLE.to_string(),
            source: StatsSource::Unavailable,
            rcon_errors: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.source == StatsSource::Unavailable
    }
}

/// `Online`, or the number of failed RCON commands.
pub fn status_text(rcon_errors: usize) -> String {
    match rcon_errors {
        0 => STATUS_ONLINE.to_string(),
        1 => "Partial data (1 RCON error)".to_string(),
        n => format!("Partial data ({n} RCON errors)"),
    }
}

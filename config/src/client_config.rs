use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Minimum spacing between two fetch cycles for the same server.
    #[serde(default = "default_throttle_window", with = "humantime_duration")]
    pub throttle_window: Duration,
    /// How often the poller asks for fresh stats.
    #[serde(default = "default_poll_interval", with = "humantime_duration")]
    pub poll_interval: Duration,
    /// Consecutive failed fetches after which a server is reported as degraded.
    #[serde(default = "default_warn_after_errors")]
    pub warn_after_errors: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            throttle_window: default_throttle_window(),
            poll_interval: default_poll_interval(),
            warn_after_errors: default_warn_after_errors(),
        }
    }
}

fn default_throttle_window() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_warn_after_errors() -> u32 {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconConfig {
    /// Number of commands kept per session for history navigation and completion.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Messages kept in the subscriber visible buffer of a log session.
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            buffer_limit: default_buffer_limit(),
        }
    }
}

fn default_buffer_limit() -> usize {
    1000
}

/// (De)serializes a [`Duration`] as a human readable string such as `5s` or `1m 30s`.
pub(crate) mod humantime_duration {
    use serde::{
        de::Error as _,
        Deserialize as _,
        Deserializer,
        Serializer,
    };
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        humantime::parse_duration(&value).map_err(|e| D::Error::custom(format!("invalid duration '{value}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn durations_are_human_readable() {
        let stats: StatsConfig = serde_yml::from_str("throttle_window: 2s\npoll_interval: 1m 30s").unwrap();
        assert_eq!(stats.throttle_window, Duration::from_secs(2));
        assert_eq!(stats.poll_interval, Duration::from_secs(90));
        assert_eq!(stats.warn_after_errors, 3);

        let yaml = serde_yml::to_string(&StatsConfig::default()).unwrap();
        assert!(yaml.contains("throttle_window: '5s'"), "{yaml}");
        assert_eq!(serde_yml::from_str::<StatsConfig>(&yaml).unwrap(), StatsConfig::default());
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let result = serde_yml::from_str::<StatsConfig>("throttle_window: soon");
        assert!(result.is_err());
    }
}

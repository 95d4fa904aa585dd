use super::messages::LogChannel;
use derive_more::Display;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Point in time view of a log session.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSession {
    pub server: Option<String>,
    pub state: ConnectionState,
    #[serde(with = "channel_name")]
    pub selected_channel: LogChannel,
}

mod channel_name {
    use super::LogChannel;
    use serde::{
        Deserialize as _,
        Deserializer,
        Serializer,
    };

    pub fn serialize<S: Serializer>(channel: &LogChannel, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(channel)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LogChannel, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(LogChannel::named(Some(&name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_serializes_channel_by_name() {
        let session = LogSession {
            server: Some("TheIsland".to_string()),
            state: ConnectionState::Connected,
            selected_channel: LogChannel::File("ShooterGame.log".to_string()),
        };
        let json = serde_json::to_string(&session).unwrap();
        assert_eq!(
            json,
            r#"{"server":"TheIsland","state":"Connected","selected_channel":"ShooterGame.log"}"#
        );
        let back: LogSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}

use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    Display,
    EnumString,
};

/// How a server process is hosted, which decides the RCON transport tried first.
#[derive(Debug, Default, Clone, Copy, Display, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    Native,
    Container,
    ClusterServer,
}

impl TransportKind {
    /// Native processes and cluster members are reached through the host RCON route.
    pub fn prefers_native(&self) -> bool {
        matches!(self, TransportKind::Native | TransportKind::ClusterServer)
    }

    /// Only natively hosted processes expose the structured live-details endpoint.
    pub fn has_live_details(&self) -> bool {
        self.prefers_native()
    }
}

#[derive(Debug, Default, Clone, Copy, Display, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRef {
    pub name: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "assumed_status")]
    pub status: ServerStatus,
}

/// Servers listed in the configuration file are assumed to be up unless marked otherwise.
fn assumed_status() -> ServerStatus {
    ServerStatus::Running
}

impl ServerRef {
    pub fn new(name: impl ToString, transport: TransportKind, status: ServerStatus) -> Self {
        Self {
            name: name.to_string(),
            transport,
            status,
        }
    }

    pub fn running(name: impl ToString, transport: TransportKind) -> Self {
        Self::new(name, transport, ServerStatus::Running)
    }

    pub fn is_running(&self) -> bool {
        self.status == ServerStatus::Running
    }
}

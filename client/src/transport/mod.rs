//! Wire types and the seams the core talks to the server manager through.
//!
//! The reqwest backed implementation lives in [`http`]; tests swap in scripted fakes.

use crate::{
    error::ClientError,
    parser::RawDetails,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    future::Future,
    pin::Pin,
};
use strum::Display;

mod http;

pub use http::{
    ContainerRcon,
    ManagerApi,
    NativeRcon,
};

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Source of the structured `live-details` status.
pub trait LiveDetailsSource: Send + Sync {
    fn live_details<'a>(&'a self, server: &'a str) -> TransportFuture<'a, LiveDetailsResponse>;
}

/// One route for delivering an RCON command.
pub trait RconTransport: Send + Sync {
    fn route(&self) -> RconRoute;

    fn send<'a>(&'a self, server: &'a str, command: &'a str) -> TransportFuture<'a, RconResponse>;
}

/// The two RCON routes a command can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RconRoute {
    /// Directly to a process hosted on the host OS.
    Native,
    /// Proxied through the container management API.
    Container,
}

impl RconRoute {
    pub fn alternate(self) -> Self {
        match self {
            RconRoute::Native => RconRoute::Container,
            RconRoute::Container => RconRoute::Native,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveDetailsResponse {
    pub success: bool,
    #[serde(default)]
    pub details: Option<LiveDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDetails {
    #[serde(default)]
    pub players: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub game_time: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub raw: Option<RawDetails>,
}

impl LiveDetails {
    /// True when the payload carries none of the live counters.
    pub fn is_empty(&self) -> bool {
        self.players.is_none()
            && self.day.is_none()
            && self
                .game_time
                .as_deref()
                .map(str::trim)
                .filter(|time| !time.is_empty())
                .is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RconRequest<'a> {
    pub command: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RconResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub cached: Option<bool>,
}

/// A log file the stream can be switched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

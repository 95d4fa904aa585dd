//! Client core for watching and administering game servers through the server manager.
//!
//! - [`stats::StatsAggregator`] reconciles the structured status endpoint with RCON text.
//! - [`rcon::CommandDispatcher`] routes commands over native or container RCON with one fallback.
//! - [`logs::LogStreamClient`] multiplexes log channels over one stream per view.
//! - [`parser`] turns raw RCON output into typed values.

#[macro_use]
extern crate tracing;

pub mod error;
pub mod logs;
pub mod parser;
pub mod rcon;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;

pub use ark_console_config::{
    Config,
    LogsConfig,
    RconConfig,
    ServerRef,
    ServerStatus,
    StatsConfig,
    TransportKind,
};
pub use error::{
    ClientError,
    ErrorKind,
};
pub use logs::{
    LogHandler,
    LogStreamClient,
};
pub use rcon::{
    CommandDispatcher,
    CommandHistory,
    CommandResult,
};
pub use stats::{
    LiveStatsSnapshot,
    StatsAggregator,
    StatsPoller,
};
pub use transport::{
    ManagerApi,
    RconRoute,
};

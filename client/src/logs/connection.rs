use super::messages::{
    ClientFrame,
    ServerFrame,
};
use crate::transport::TransportFuture;
use tokio::sync::mpsc::{
    UnboundedReceiver,
    UnboundedSender,
};

/// Close reason reported when this side ended the connection.
pub const LOCAL_CLOSE_REASON: &str = "io client disconnect";

pub fn is_local_close(reason: &str) -> bool {
    reason == LOCAL_CLOSE_REASON
}

/// Opens log stream connections.
pub trait LogConnector: Send + Sync {
    fn connect<'a>(&'a self, server: &'a str) -> TransportFuture<'a, LogConnection>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Frame(ServerFrame),
    /// A problem that did not end the connection.
    Error(String),
    /// The connection is gone. The last event of every connection.
    Closed(String),
}

/// An open log stream. Dropping `frames` closes it with [`LOCAL_CLOSE_REASON`].
#[derive(Debug)]
pub struct LogConnection {
    pub frames: UnboundedSender<ClientFrame>,
    pub events: UnboundedReceiver<ConnectionEvent>,
}

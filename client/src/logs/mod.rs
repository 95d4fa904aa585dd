//! Log stream session of one view: one connection per server, several logical channels over it.
//!
//! The session never reconnects on its own. A connection that ends for any reason other than a
//! local close is reported as an error and leaves the session disconnected until `connect` or
//! `reconnect` is called again.

use crate::{
    error::ClientError,
    Config,
    LogsConfig,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tokio::sync::{
    mpsc::{
        UnboundedReceiver,
        UnboundedSender,
    },
    watch,
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

mod connection;
mod handler;
mod messages;
mod state;
mod websocket;

pub use connection::{
    is_local_close,
    ConnectionEvent,
    LogConnection,
    LogConnector,
    LOCAL_CLOSE_REASON,
};
pub use handler::LogHandler;
pub use messages::{
    ArkLogEntry,
    ClientFrame,
    ErrorFrame,
    LogChannel,
    LogEntry,
    LogKind,
    LogMessage,
    ServerFrame,
    CONTAINER_CHANNEL,
};
pub use state::{
    ConnectionState,
    LogSession,
};
pub use websocket::WebSocketLogConnector;

/// State shared between the client and its driver task.
#[derive(Debug)]
struct SessionBuffer {
    messages: VecDeque<LogMessage>,
    limit: usize,
    last_error: Option<String>,
    selected: LogChannel,
}

impl SessionBuffer {
    fn new(limit: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            limit: limit.max(1),
            last_error: None,
            selected: LogChannel::Container,
        }
    }

    fn select(&mut self, channel: LogChannel) {
        self.messages.clear();
        self.selected = channel;
    }

    /// Whether a frame belongs to the selected channel. File lines without a file name cannot be
    /// told apart and are accepted while any file is selected.
    fn accepts(&self, frame: &ServerFrame) -> bool {
        match (frame, &self.selected) {
            (ServerFrame::ContainerLog(_), LogChannel::Container) => true,
            (ServerFrame::ArkLog(ark), LogChannel::File(selected)) => {
                ark.file.as_ref().map_or(true, |file| file == selected)
            }
            (ServerFrame::SystemLog(_) | ServerFrame::Error(_), _) => true,
            _ => false,
        }
    }

    fn push(&mut self, kind: LogKind, entry: &LogEntry) {
        self.messages.push_back(LogMessage {
            kind,
            entry: entry.clone(),
        });
        while self.messages.len() > self.limit {
            self.messages.pop_front();
        }
    }
}

pub struct LogStreamClient {
    connector: Arc<dyn LogConnector>,
    handler: Arc<dyn LogHandler>,
    shared: Arc<Mutex<SessionBuffer>>,
    state: Arc<watch::Sender<ConnectionState>>,
    server: Option<String>,
    frames: Option<UnboundedSender<ClientFrame>>,
    driver: Option<DropGuard>,
}

impl std::fmt::Debug for LogStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStreamClient")
            .field("server", &self.server)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl LogStreamClient {
    pub fn new(connector: Arc<dyn LogConnector>, handler: Arc<dyn LogHandler>, buffer_limit: usize) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            handler,
            shared: Arc::new(Mutex::new(SessionBuffer::new(buffer_limit))),
            state: Arc::new(state),
            server: None,
            frames: None,
            driver: None,
        }
    }

    /// WebSocket backed client for `config`.
    pub fn from_config(config: &Config, handler: Arc<dyn LogHandler>) -> Result<Self, ClientError> {
        let connector = WebSocketLogConnector::from_config(config)?;
        let LogsConfig { buffer_limit } = config.logs;
        Ok(Self::new(Arc::new(connector), handler, buffer_limit))
    }

    fn shared(&self) -> MutexGuard<'_, SessionBuffer> {
        lock(&self.shared)
    }

    /// Opens the stream of `server` and subscribes to `channel`, the container output by default.
    /// An existing connection is closed first.
    #[instrument(level = "debug", skip(self))]
    pub async fn connect(&mut self, server: &str, channel: Option<&str>) -> Result<(), ClientError> {
        self.disconnect();

        let channel = LogChannel::named(channel);
        {
            let mut shared = self.shared();
            shared.select(channel.clone());
            shared.last_error = None;
        }
        self.server = Some(server.to_string());
        self.state.send_replace(ConnectionState::Connecting);

        let LogConnection { frames, events } = match self.connector.connect(server).await {
            Ok(connection) => connection,
            Err(err) => {
                let message = err.to_string();
                warn!(server, %message, "log stream connection failed");
                self.state.send_replace(ConnectionState::Disconnected);
                self.shared().last_error = Some(message.clone());
                self.handler.on_error(&message);
                return Err(err);
            }
        };

        info!(server, %channel, "log stream connected");
        self.state.send_replace(ConnectionState::Connected);
        self.handler.on_connect();

        let token = CancellationToken::new();
        self.driver = Some(token.clone().drop_guard());
        tokio::spawn({
            let driver = Driver {
                shared: self.shared.clone(),
                handler: self.handler.clone(),
                state: self.state.clone(),
            };
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {},
                    _ = driver.run(events) => {},
                }
            }
        });

        if frames.send(channel.subscribe_frame()).is_err() {
            debug!(server, "log stream closed before subscribing");
        }
        self.frames = Some(frames);
        Ok(())
    }

    /// Connects again to the last server and channel.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        let server = self
            .server
            .clone()
            .ok_or_else(|| ClientError::validation("no log stream to reconnect"))?;
        let channel = self.selected_channel();
        self.connect(&server, Some(&channel.to_string())).await
    }

    /// Closes the connection. The local close is not an error.
    pub fn disconnect(&mut self) {
        let Some(frames) = self.frames.take() else {
            return;
        };
        let _ = frames.send(ClientFrame::StopLogs);
        drop(frames);
        self.driver.take();

        let was_open = *self.state.borrow() != ConnectionState::Disconnected;
        if was_open {
            self.state.send_replace(ConnectionState::Disconnected);
            self.handler.on_disconnect(LOCAL_CLOSE_REASON);
        }
        debug!(server = ?self.server, "log stream disconnected");
    }

    /// Switches to the lines of log file `name`. The reserved name `container` selects the
    /// container output instead.
    pub fn switch_log_file(&self, name: &str) -> Result<(), ClientError> {
        self.subscribe(LogChannel::named(Some(name)))
    }

    pub fn switch_to_container_logs(&self) -> Result<(), ClientError> {
        self.subscribe(LogChannel::Container)
    }

    /// Clears the visible buffer before asking the backend for the new channel, so nothing of the
    /// new channel can be cleared away.
    fn subscribe(&self, channel: LogChannel) -> Result<(), ClientError> {
        let frames = match &self.frames {
            Some(frames) if self.connection_state().is_connected() => frames,
            _ => return Err(ClientError::validation("log stream is not connected")),
        };

        self.shared().select(channel.clone());
        debug!(server = ?self.server, %channel, "switching log channel");

        let gone = || ClientError::transport("log stream connection is gone");
        frames.send(ClientFrame::StopLogs).map_err(|_| gone())?;
        frames.send(channel.subscribe_frame()).map_err(|_| gone())
    }

    pub fn messages(&self) -> Vec<LogMessage> {
        self.shared().messages.iter().cloned().collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared().last_error.clone()
    }

    pub fn selected_channel(&self) -> LogChannel {
        self.shared().selected.clone()
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn session(&self) -> LogSession {
        LogSession {
            server: self.server.clone(),
            state: self.connection_state(),
            selected_channel: self.selected_channel(),
        }
    }
}

impl Drop for LogStreamClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn lock(shared: &Mutex<SessionBuffer>) -> MutexGuard<'_, SessionBuffer> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies connection events to the session, one connection's worth.
struct Driver {
    shared: Arc<Mutex<SessionBuffer>>,
    handler: Arc<dyn LogHandler>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Driver {
    async fn run(self, mut events: UnboundedReceiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Frame(frame) => self.deliver(frame),
                ConnectionEvent::Error(error) => self.error(error),
                ConnectionEvent::Closed(reason) => return self.closed(reason),
            }
        }
        self.closed("connection lost".to_string());
    }

    fn deliver(&self, frame: ServerFrame) {
        {
            let mut shared = lock(&self.shared);
            if !shared.accepts(&frame) {
                trace!(%frame, selected = %shared.selected, "dropping frame of another channel");
                return;
            }
            match &frame {
                ServerFrame::ContainerLog(entry) => shared.push(LogKind::Container, entry),
                ServerFrame::ArkLog(ark) => shared.push(LogKind::Ark, &ark.entry),
                ServerFrame::SystemLog(entry) => shared.push(LogKind::System, entry),
                ServerFrame::Error(_) => {}
            }
        }

        match &frame {
            ServerFrame::ContainerLog(entry) => self.handler.on_container_log(entry),
            ServerFrame::ArkLog(ark) => self.handler.on_ark_log(ark.file.as_deref(), &ark.entry),
            ServerFrame::SystemLog(entry) => self.handler.on_system_log(entry),
            ServerFrame::Error(error) => self.error(error.message().to_string()),
        }
    }

    fn error(&self, error: String) {
        warn!(%error, "log stream error");
        lock(&self.shared).last_error = Some(error.clone());
        self.handler.on_error(&error);
    }

    fn closed(&self, reason: String) {
        self.state.send_replace(ConnectionState::Disconnected);
        if is_local_close(&reason) {
            debug!("log stream closed locally");
        } else {
            self.error(reason.clone());
        }
        self.handler.on_disconnect(&reason);
    }
}

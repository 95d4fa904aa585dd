//! Scripted fakes for the transport seams.

use crate::{
    error::ClientError,
    logs::{
        ClientFrame,
        ConnectionEvent,
        LogConnection,
        LogConnector,
        LogEntry,
        LogHandler,
        ServerFrame,
    },
    transport::{
        LiveDetailsResponse,
        LiveDetailsSource,
        RconResponse,
        RconRoute,
        RconTransport,
        TransportFuture,
    },
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::sync::mpsc::{
    unbounded_channel,
    UnboundedReceiver,
    UnboundedSender,
};

type Script<T> = Arc<dyn Fn() -> Result<T, ClientError> + Send + Sync>;

pub(crate) fn ok_response(text: &str) -> RconResponse {
    RconResponse {
        success: true,
        message: "Command executed".to_string(),
        response: Some(text.to_string()),
        cached: None,
    }
}

pub(crate) fn failed_response(message: &str) -> RconResponse {
    RconResponse {
        success: false,
        message: message.to_string(),
        response: None,
        cached: None,
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

pub(crate) struct FakeLiveDetails {
    script: Mutex<Option<Script<LiveDetailsResponse>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<usize>,
}

impl FakeLiveDetails {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(None),
            delay: Mutex::new(None),
            calls: Mutex::new(0),
        })
    }

    pub(crate) fn respond(&self, script: impl Fn() -> Result<LiveDetailsResponse, ClientError> + Send + Sync + 'static) {
        *self.script.lock().unwrap() = Some(Arc::new(script));
    }

    pub(crate) fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl LiveDetailsSource for FakeLiveDetails {
    fn live_details<'a>(&'a self, _server: &'a str) -> TransportFuture<'a, LiveDetailsResponse> {
        *self.calls.lock().unwrap() += 1;
        let script = self.script.lock().unwrap().clone();
        let delay = *self.delay.lock().unwrap();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match script {
                Some(script) => script(),
                None => Err(ClientError::transport("live details not scripted")),
            }
        })
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

pub(crate) struct FakeRcon {
    route: RconRoute,
    replies: Mutex<HashMap<String, Script<RconResponse>>>,
    fallback: Mutex<Option<Script<RconResponse>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeRcon {
    pub(crate) fn new(route: RconRoute) -> Arc<Self> {
        Arc::new(Self {
            route,
            replies: Mutex::new(HashMap::new()),
            fallback: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn reply(&self, command: &str, response: RconResponse) {
        self.replies
            .lock()
            .unwrap()
            .insert(command.to_string(), Arc::new(move || -> Result<RconResponse, ClientError> { Ok(response.clone()) }));
    }

    /// Every command without a scripted reply fails with `error`.
    pub(crate) fn fail_with(&self, error: impl Fn() -> ClientError + Send + Sync + 'static) {
        *self.fallback.lock().unwrap() = Some(Arc::new(move || -> Result<RconResponse, ClientError> { Err(error()) }));
    }

    /// `(server, command)` per call, in call order.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RconTransport for FakeRcon {
    fn route(&self) -> RconRoute {
        self.route
    }

    fn send<'a>(&'a self, server: &'a str, command: &'a str) -> TransportFuture<'a, RconResponse> {
        self.calls.lock().unwrap().push((server.to_string(), command.to_string()));
        let script = self
            .replies
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .or_else(|| self.fallback.lock().unwrap().clone());
        Box::pin(async move {
            match script {
                Some(script) => script(),
                None => Err(ClientError::validation(format!("unscripted command {command}"))),
            }
        })
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// The far end of a fake log connection.
pub(crate) struct FakeLogPeer {
    pub(crate) frames: UnboundedReceiver<ClientFrame>,
    pub(crate) events: UnboundedSender<ConnectionEvent>,
}

impl FakeLogPeer {
    pub(crate) fn send(&self, frame: ServerFrame) {
        let _ = self.events.send(ConnectionEvent::Frame(frame));
    }

    pub(crate) fn close(&self, reason: &str) {
        let _ = self.events.send(ConnectionEvent::Closed(reason.to_string()));
    }
}

/// Hands out prepared connections in order, then refuses.
pub(crate) struct FakeLogConnector {
    pending: Mutex<VecDeque<Result<LogConnection, ClientError>>>,
    connections: Mutex<Vec<String>>,
}

impl FakeLogConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            connections: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn accept(&self) -> FakeLogPeer {
        let (frame_tx, frame_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        self.pending.lock().unwrap().push_back(Ok(LogConnection {
            frames: frame_tx,
            events: event_rx,
        }));
        FakeLogPeer {
            frames: frame_rx,
            events: event_tx,
        }
    }

    pub(crate) fn refuse(&self, error: ClientError) {
        self.pending.lock().unwrap().push_back(Err(error));
    }

    /// Servers connected to, in order.
    pub(crate) fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }
}

impl LogConnector for FakeLogConnector {
    fn connect<'a>(&'a self, server: &'a str) -> TransportFuture<'a, LogConnection> {
        self.connections.lock().unwrap().push(server.to_string());
        let next = self
            .pending
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::transport("no connection scripted")));
        Box::pin(async move { next })
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HandlerEvent {
    Container(String),
    Ark(Option<String>, String),
    System(String),
    Connect,
    Disconnect(String),
    Error(String),
}

/// Forwards every handler call into a channel the test can await.
pub(crate) struct RecordingHandler {
    events: UnboundedSender<HandlerEvent>,
}

impl RecordingHandler {
    pub(crate) fn new() -> (Arc<Self>, UnboundedReceiver<HandlerEvent>) {
        let (events, receiver) = unbounded_channel();
        (Arc::new(Self { events }), receiver)
    }

    fn record(&self, event: HandlerEvent) {
        let _ = self.events.send(event);
    }
}

impl LogHandler for RecordingHandler {
    fn on_container_log(&self, entry: &LogEntry) {
        self.record(HandlerEvent::Container(entry.message.clone()));
    }

    fn on_ark_log(&self, file: Option<&str>, entry: &LogEntry) {
        self.record(HandlerEvent::Ark(file.map(ToString::to_string), entry.message.clone()));
    }

    fn on_system_log(&self, entry: &LogEntry) {
        self.record(HandlerEvent::System(entry.message.clone()));
    }

    fn on_connect(&self) {
        self.record(HandlerEvent::Connect);
    }

    fn on_disconnect(&self, reason: &str) {
        self.record(HandlerEvent::Disconnect(reason.to_string()));
    }

    fn on_error(&self, error: &str) {
        self.record(HandlerEvent::Error(error.to_string()));
    }
}

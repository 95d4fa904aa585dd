use ark_console_client::logs::{
    ConnectionEvent,
    ConnectionState,
    LogChannel,
    LogConnector,
    LogEntry,
    LogHandler,
    LogStreamClient,
    WebSocketLogConnector,
    LOCAL_CLOSE_REASON,
};
use futures::{
    SinkExt,
    StreamExt,
};
use pretty_assertions::assert_eq;
use serde_json::{
    json,
    Value,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    net::TcpListener,
    sync::{
        mpsc::{
            unbounded_channel,
            UnboundedReceiver,
            UnboundedSender,
        },
        oneshot,
    },
};
use tokio_tungstenite::{
    accept_async,
    accept_hdr_async,
    tungstenite::{
        handshake::server::{
            ErrorResponse,
            Request,
            Response,
        },
        protocol::{
            frame::coding::CloseCode,
            CloseFrame,
        },
        Message,
    },
};
use url::Url;

struct ChannelHandler(UnboundedSender<String>);

impl LogHandler for ChannelHandler {
    fn on_container_log(&self, entry: &LogEntry) {
        let _ = self.0.send(format!("container: {}", entry.message));
    }

    fn on_ark_log(&self, file: Option<&str>, entry: &LogEntry) {
        let _ = self.0.send(format!("ark {}: {}", file.unwrap_or("?"), entry.message));
    }

    fn on_connect(&self) {
        let _ = self.0.send("connect".to_string());
    }

    fn on_disconnect(&self, reason: &str) {
        let _ = self.0.send(format!("disconnect: {reason}"));
    }

    fn on_error(&self, error: &str) {
        let _ = self.0.send(format!("error: {error}"));
    }
}

/// One-connection WebSocket server driven by the test.
struct LogServer {
    url: Url,
    path: oneshot::Receiver<String>,
    from_client: UnboundedReceiver<Value>,
    to_client: UnboundedSender<Message>,
}

async fn spawn_log_server() -> LogServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (path_tx, path_rx) = oneshot::channel();
    let (from_tx, from_rx) = unbounded_channel();
    let (to_tx, mut to_rx) = unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = path_tx.send(request.uri().path().to_string());
            Ok(response)
        };
        let ws_stream = accept_hdr_async(stream, callback).await.unwrap();
        let (mut sink, mut source) = ws_stream.split();
        loop {
            tokio::select! {
                message = to_rx.recv() => match message {
                    Some(message) => {
                        let _ = sink.send(message).await;
                    }
                    None => break,
                },
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = from_tx.send(serde_json::from_str::<Value>(text.as_str()).unwrap());
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    LogServer {
        url: Url::parse(&format!("ws://{addr}")).unwrap(),
        path: path_rx,
        from_client: from_rx,
        to_client: to_tx,
    }
}

async fn next<T>(receiver: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for the next message")
        .expect("channel closed")
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

fn client(server: &LogServer) -> (LogStreamClient, UnboundedReceiver<String>) {
    let (events_tx, events) = unbounded_channel();
    let connector = WebSocketLogConnector::new(server.url.clone(), None);
    let client = LogStreamClient::new(Arc::new(connector), Arc::new(ChannelHandler(events_tx)), 100);
    (client, events)
}

#[tokio::test]
async fn streams_switches_and_reports_a_remote_close() {
    let mut server = spawn_log_server().await;
    let (mut client, mut events) = client(&server);

    client.connect("TheIsland", None).await.unwrap();
    assert_eq!(next(&mut events).await, "connect");
    assert_eq!((&mut server.path).await.unwrap(), "/api/logs/TheIsland/stream");
    assert_eq!(next(&mut server.from_client).await, json!({"event": "start-container-logs"}));

    server
        .to_client
        .send(text(json!({"event": "container-log", "data": {"level": "info", "message": "server started"}})))
        .unwrap();
    assert_eq!(next(&mut events).await, "container: server started");
    assert_eq!(client.messages().len(), 1);

    client.switch_log_file("ShooterGame.log").unwrap();
    assert!(client.messages().is_empty());
    assert_eq!(client.selected_channel(), LogChannel::File("ShooterGame.log".to_string()));
    assert_eq!(next(&mut server.from_client).await, json!({"event": "stop-logs"}));
    assert_eq!(
        next(&mut server.from_client).await,
        json!({"event": "start-ark-logs", "data": {"file": "ShooterGame.log"}})
    );

    server
        .to_client
        .send(text(json!({
            "event": "ark-log",
            "data": {"file": "ShooterGame.log", "level": "info", "message": "Saving world"}
        })))
        .unwrap();
    assert_eq!(next(&mut events).await, "ark ShooterGame.log: Saving world");

    server
        .to_client
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "server restarting".into(),
        })))
        .unwrap();
    assert_eq!(next(&mut events).await, "error: server restarting");
    assert_eq!(next(&mut events).await, "disconnect: server restarting");
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.last_error().as_deref(), Some("server restarting"));
}

#[tokio::test]
async fn explicit_disconnect_is_quiet() {
    let mut server = spawn_log_server().await;
    let (mut client, mut events) = client(&server);

    client.connect("Ragnarok", Some("ShooterGame.log")).await.unwrap();
    assert_eq!(next(&mut events).await, "connect");
    assert_eq!(
        next(&mut server.from_client).await,
        json!({"event": "start-ark-logs", "data": {"file": "ShooterGame.log"}})
    );

    client.disconnect();

    assert_eq!(next(&mut events).await, format!("disconnect: {LOCAL_CLOSE_REASON}"));
    assert_eq!(next(&mut server.from_client).await, json!({"event": "stop-logs"}));
    assert_eq!(client.last_error(), None);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn refused_connection_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (events_tx, mut events) = unbounded_channel();
    let connector = WebSocketLogConnector::new(Url::parse(&format!("ws://{addr}")).unwrap(), None);
    let mut client = LogStreamClient::new(Arc::new(connector), Arc::new(ChannelHandler(events_tx)), 100);

    let err = client.connect("TheIsland", None).await.unwrap_err();

    assert!(err.is_transport());
    assert!(next(&mut events).await.starts_with("error: "));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn local_close_gives_up_on_a_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Accepts the stream but never reads, so the close frame is never answered.
        let _ws_stream = accept_async(stream).await.unwrap();
        let _ = release_rx.await;
    });

    let connector = WebSocketLogConnector::new(Url::parse(&format!("ws://{addr}")).unwrap(), None);
    let mut connection = connector.connect("TheIsland").await.unwrap();
    drop(connection.frames);

    assert_eq!(
        next(&mut connection.events).await,
        ConnectionEvent::Closed(LOCAL_CLOSE_REASON.to_string())
    );
    drop(release_tx);
}

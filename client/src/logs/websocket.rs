use super::{
    connection::{
        ConnectionEvent,
        LogConnection,
        LogConnector,
        LOCAL_CLOSE_REASON,
    },
    messages::{
        ClientFrame,
        ServerFrame,
    },
};
use crate::{
    error::ClientError,
    transport::TransportFuture,
    Config,
};
use futures::{
    SinkExt,
    StreamExt,
};
use std::time::Duration;
use tokio::{
    sync::mpsc::unbounded_channel,
    time::{
        sleep,
        timeout,
    },
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest as _,
        http::{
            header::AUTHORIZATION,
            HeaderValue,
        },
        protocol::Message,
    },
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How long a locally closed stream waits for the server to acknowledge the close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Log streams over a WebSocket at `{base}/api/logs/{server}/stream`.
#[derive(Debug, Clone)]
pub struct WebSocketLogConnector {
    base_url: Url,
    token: Option<String>,
}

impl WebSocketLogConnector {
    pub fn new(base_url: Url, token: Option<String>) -> Self {
        Self { base_url, token }
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let base_url = config.log_stream_base().map_err(ClientError::validation)?;
        Ok(Self::new(base_url, config.api_token.clone()))
    }

    pub fn stream_url(&self, server: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "logs", server, "stream"]);
        }
        url
    }

    #[instrument(level = "debug", skip(self))]
    async fn open(&self, server: &str) -> Result<LogConnection, ClientError> {
        let url = self.stream_url(server);
        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::validation("api token is not a valid header value"))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!(%url, "connecting log stream");
        let (ws_stream, _response) = connect_async(request).await?;
        let (mut outgoing, mut incoming) = ws_stream.split();

        let (frame_tx, mut frame_rx) = unbounded_channel::<ClientFrame>();
        let (event_tx, event_rx) = unbounded_channel::<ConnectionEvent>();
        let receiver_done = CancellationToken::new();
        let local_close = CancellationToken::new();

        tokio::spawn({
            let receiver_done = receiver_done.clone();
            let local_close = local_close.clone();
            let event_tx = event_tx.clone();
            async move {
                loop {
                    let frame = tokio::select! {
                        biased;
                        _ = receiver_done.cancelled() => return,
                        frame = frame_rx.recv() => frame,
                    };
                    let Some(frame) = frame else {
                        break;
                    };
                    trace!(%frame, "sending log stream frame");
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(err) => {
                            error!("Error serializing log stream frame: {err}");
                            continue;
                        }
                    };
                    if let Err(err) = outgoing.send(Message::Text(text.into())).await {
                        let _ = event_tx.send(ConnectionEvent::Error(format!("failed to send {frame}: {err}")));
                        return;
                    }
                }
                local_close.cancel();
                match timeout(CLOSE_GRACE, outgoing.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => debug!("Error closing log stream: {err}"),
                    Err(_) => debug!("Timed out closing log stream"),
                }
            }
        });

        tokio::spawn(async move {
            let _done = receiver_done.drop_guard();
            let close_expired = async {
                local_close.cancelled().await;
                sleep(CLOSE_GRACE).await;
            };
            tokio::pin!(close_expired);
            let reason = loop {
                let next = tokio::select! {
                    _ = &mut close_expired => None,
                    next = incoming.next() => Some(next),
                };
                let Some(next) = next else {
                    debug!("server did not acknowledge the close in {CLOSE_GRACE:?}");
                    break LOCAL_CLOSE_REASON.to_string();
                };
                let Some(result) = next else {
                    break "connection lost".to_string();
                };
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                        Ok(frame) => {
                            if event_tx.send(ConnectionEvent::Frame(frame)).is_err() {
                                break LOCAL_CLOSE_REASON.to_string();
                            }
                        }
                        Err(err) => warn!("Ignoring malformed log stream frame: {err}"),
                    },
                    Ok(Message::Close(frame)) => {
                        break frame
                            .map(|frame| frame.reason.as_str().trim().to_string())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "server closed the connection".to_string());
                    }
                    Ok(Message::Binary(_)) => trace!("Ignoring binary log stream message"),
                    Ok(_) => {}
                    Err(err) => break err.to_string(),
                }
            };
            let reason = if local_close.is_cancelled() {
                LOCAL_CLOSE_REASON.to_string()
            } else {
                reason
            };
            debug!(%reason, "log stream closed");
            let _ = event_tx.send(ConnectionEvent::Closed(reason));
        });

        Ok(LogConnection {
            frames: frame_tx,
            events: event_rx,
        })
    }
}

impl LogConnector for WebSocketLogConnector {
    fn connect<'a>(&'a self, server: &'a str) -> TransportFuture<'a, LogConnection> {
        Box::pin(self.open(server))
    }
}

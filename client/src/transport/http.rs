use super::{
    LiveDetailsResponse,
    LiveDetailsSource,
    LogFile,
    RconRequest,
    RconResponse,
    RconRoute,
    RconTransport,
    TransportFuture,
};
use crate::{
    error::ClientError,
    Config,
};
use reqwest::{
    Client as HttpClient,
    RequestBuilder,
    Response,
};
use serde::{
    de::DeserializeOwned,
    Deserialize,
};
use std::time::Duration;
use url::Url;

/// reqwest client for the server manager REST API.
#[derive(Debug, Clone)]
pub struct ManagerApi {
    http: HttpClient,
    base_url: Url,
    token: Option<String>,
}

impl ManagerApi {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::validation(format!("{base_url} cannot be used as a base URL")));
        }
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, token })
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::new(config.api_url.clone(), config.api_token.clone(), config.request_timeout)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.authorize(self.http.get(url)).send().await?;
        read_json(response).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.authorize(self.http.post(url)).json(body).send().await?;
        read_json(response).await
    }

    /// `GET /api/native-servers/{name}/live-details`
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_live_details(&self, server: &str) -> Result<LiveDetailsResponse, ClientError> {
        let url = self.endpoint(&["api", "native-servers", server, "live-details"]);
        self.get_json(url).await
    }

    /// `POST /api/native-servers/{name}/rcon` or `POST /api/containers/{name}/rcon`
    #[instrument(level = "debug", skip(self))]
    pub async fn rcon(&self, route: RconRoute, server: &str, command: &str) -> Result<RconResponse, ClientError> {
        let url = match route {
            RconRoute::Native => self.endpoint(&["api", "native-servers", server, "rcon"]),
            RconRoute::Container => self.endpoint(&["api", "containers", server, "rcon"]),
        };
        self.post_json(url, &RconRequest { command }).await
    }

    /// `GET /api/logs/{name}/files`
    #[instrument(level = "debug", skip(self))]
    pub async fn list_log_files(&self, server: &str) -> Result<Vec<LogFile>, ClientError> {
        let url = self.endpoint(&["api", "logs", server, "files"]);
        let listing: LogFileListing = self.get_json(url).await?;
        Ok(listing.into_files())
    }

    pub fn native(&self) -> NativeRcon {
        NativeRcon(self.clone())
    }

    pub fn container(&self) -> ContainerRcon {
        ContainerRcon(self.clone())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::from_status(status, &body));
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Older managers wrap the listing in an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum LogFileListing {
    Bare(Vec<LogFile>),
    Wrapped { files: Vec<LogFile> },
}

impl LogFileListing {
    fn into_files(self) -> Vec<LogFile> {
        match self {
            LogFileListing::Bare(files) | LogFileListing::Wrapped { files } => files,
        }
    }
}

impl LiveDetailsSource for ManagerApi {
    fn live_details<'a>(&'a self, server: &'a str) -> TransportFuture<'a, LiveDetailsResponse> {
        Box::pin(self.fetch_live_details(server))
    }
}

/// RCON delivered straight to a natively hosted server.
#[derive(Debug, Clone)]
pub struct NativeRcon(pub ManagerApi);

impl RconTransport for NativeRcon {
    fn route(&self) -> RconRoute {
        RconRoute::Native
    }

    fn send<'a>(&'a self, server: &'a str, command: &'a str) -> TransportFuture<'a, RconResponse> {
        Box::pin(self.0.rcon(RconRoute::Native, server, command))
    }
}

/// RCON proxied through the container management API.
#[derive(Debug, Clone)]
pub struct ContainerRcon(pub ManagerApi);

impl RconTransport for ContainerRcon {
    fn route(&self) -> RconRoute {
        RconRoute::Container
    }

    fn send<'a>(&'a self, server: &'a str, command: &'a str) -> TransportFuture<'a, RconResponse> {
        Box::pin(self.0.rcon(RconRoute::Container, server, command))
    }
}

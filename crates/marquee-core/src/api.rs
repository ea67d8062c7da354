//! Media server HTTP API
//!
//! [`MediaServer`] is the seam between the engine and the network; the
//! engine only ever talks to the server through it. [`HttpMediaServer`] is
//! the `reqwest` implementation.

use crate::{
    wire::{PlaybackInfoRequest, PlaybackInfoResponse, PlaybackReport},
    Error, Result,
};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Session credentials supplied by the authentication layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Server base address, e.g. `https://media.example.com/jellyfin`
    pub base_url: Url,
    pub access_token: String,
    pub user_id: String,
    pub device_id: String,
}

impl Credentials {
    pub fn new(
        base_url: Url,
        access_token: impl Into<String>,
        user_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            access_token: access_token.into(),
            user_id: user_id.into(),
            device_id: device_id.into(),
        }
    }

    /// Server base without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Absolute URL for a server-relative path such as `/Items/x/PlaybackInfo`
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let separator = if path.starts_with('/') { "" } else { "/" };
        Ok(Url::parse(&format!("{}{}{}", self.base(), separator, path))?)
    }
}

/// Identity of this client, sent in every authorization header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    pub client: String,
    pub device: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            client: "Marquee".to_string(),
            device: "Marquee Player".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Value of the `Authorization` header
pub fn authorization_header(client: &ClientInfo, credentials: &Credentials) -> String {
    format!(
        "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\", Token=\"{}\"",
        client.client, client.device, credentials.device_id, client.version, credentials.access_token
    )
}

/// Which session reporting endpoint to hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Start,
    Progress,
    Stopped,
}

impl ReportKind {
    pub fn path(&self) -> &'static str {
        match self {
            ReportKind::Start => "/Sessions/Playing",
            ReportKind::Progress => "/Sessions/Playing/Progress",
            ReportKind::Stopped => "/Sessions/Playing/Stopped",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Start => write!(f, "start"),
            ReportKind::Progress => write!(f, "progress"),
            ReportKind::Stopped => write!(f, "stop"),
        }
    }
}

/// Operations the engine needs from the media server
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Credentials used for URL construction
    fn credentials(&self) -> &Credentials;

    /// `POST /Items/{itemId}/PlaybackInfo`
    async fn playback_info(
        &self,
        item_id: &str,
        request: &PlaybackInfoRequest,
    ) -> Result<PlaybackInfoResponse>;

    /// `POST /Sessions/Playing[/Progress|/Stopped]`
    async fn report(&self, kind: ReportKind, report: &PlaybackReport) -> Result<()>;

    /// Lightweight round trip used by the latency probe
    async fn ping(&self) -> Result<()>;
}

/// `reqwest` backed media server client
pub struct HttpMediaServer {
    client: Client,
    credentials: Credentials,
    authorization: String,
}

impl HttpMediaServer {
    /// Create a client with the given request timeout
    pub fn new(credentials: Credentials, client_info: &ClientInfo, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let authorization = authorization_header(client_info, &credentials);

        Ok(Self {
            client,
            credentials,
            authorization,
        })
    }

    fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url).header(AUTHORIZATION, &self.authorization)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16()));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Split connection failures from other transport errors
fn transport_error(err: reqwest::Error) -> Error {
    if err.is_connect() {
        Error::ConnectionFailed(err.to_string())
    } else if err.is_decode() {
        Error::Decoding(err.to_string())
    } else {
        Error::Network(err)
    }
}

#[async_trait]
impl MediaServer for HttpMediaServer {
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[instrument(skip(self, request))]
    async fn playback_info(
        &self,
        item_id: &str,
        request: &PlaybackInfoRequest,
    ) -> Result<PlaybackInfoResponse> {
        let url = self
            .credentials
            .endpoint(&format!("/Items/{}/PlaybackInfo", item_id))?;
        debug!(url = %url, bitrate = request.max_streaming_bitrate, "Requesting playback info");
        self.send_json(self.post(url).json(request)).await
    }

    #[instrument(skip(self, report), fields(item_id = %report.item_id))]
    async fn report(&self, kind: ReportKind, report: &PlaybackReport) -> Result<()> {
        let url = self.credentials.endpoint(kind.path())?;
        self.send(self.post(url).json(report)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let url = self.credentials.endpoint("/System/Ping")?;
        self.send(self.client.get(url).header(AUTHORIZATION, &self.authorization))
            .await?;
        Ok(())
    }
}

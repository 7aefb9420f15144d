use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::client::{AddParams, AddedOutput, ClusterIdentity, ContentReader, PinningCluster};
use crate::error::{ClusterError, ClusterResult};

/// Connection settings for [`RestClusterClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestClientConfig {
    /// Base URL of the cluster REST API.
    pub api_url: String,
    /// Base URL of the cluster's IPFS proxy endpoint, used for reads.
    pub proxy_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:9094".into(),
            proxy_url: "http://127.0.0.1:9095".into(),
            username: None,
            password: None,
        }
    }
}

/// Error object the cluster API streams in place of a result.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: u16,
    message: String,
}

/// [`PinningCluster`] over the cluster's HTTP API.
///
/// Writes go to the REST API (`/add`), reads go through the IPFS proxy
/// (`/api/v0/cat`).
#[derive(Clone, Debug)]
pub struct RestClusterClient {
    http: Client,
    api: Url,
    proxy: Url,
    credentials: Option<(String, Option<String>)>,
}

impl RestClusterClient {
    pub fn new(config: &RestClientConfig) -> ClusterResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            api: base_url(&config.api_url)?,
            proxy: base_url(&config.proxy_url)?,
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api
    }

    fn endpoint(base: &Url, path: &str) -> ClusterResult<Url> {
        base.join(path)
            .map_err(|e| ClusterError::Config(format!("invalid endpoint {path}: {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }
}

/// Parse `raw` as a base URL; joins are relative to it, so it must end in `/`.
fn base_url(raw: &str) -> ClusterResult<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| ClusterError::Config(format!("invalid url {raw:?}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn check_status(response: Response) -> ClusterResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClusterError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode one NDJSON line of an add response. Blank lines yield `None`.
fn decode_add_line(line: &[u8]) -> ClusterResult<Option<AddedOutput>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_slice(line).map_err(|e| ClusterError::Decode(e.to_string()))?;
    if value.get("code").is_some() && value.get("message").is_some() {
        let err: ApiError =
            serde_json::from_value(value).map_err(|e| ClusterError::Decode(e.to_string()))?;
        return Err(ClusterError::Api {
            code: err.code,
            message: err.message,
        });
    }
    match serde_json::from_value(value) {
        Ok(event) => Ok(Some(event)),
        Err(e) => {
            warn!(error = %e, "skipping undecodable add event");
            Ok(None)
        }
    }
}

#[async_trait]
impl PinningCluster for RestClusterClient {
    async fn id(&self) -> ClusterResult<ClusterIdentity> {
        let url = Self::endpoint(&self.api, "id")?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let identity = check_status(response).await?.json().await?;
        Ok(identity)
    }

    async fn add(
        &self,
        paths: &[PathBuf],
        params: &AddParams,
        events: mpsc::Sender<AddedOutput>,
    ) -> ClusterResult<()> {
        let mut form = Form::new();
        for path in paths {
            let file = tokio::fs::File::open(path).await?;
            let len = file.metadata().await?.len();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| params.name.clone());
            let part = Part::stream_with_length(reqwest::Body::from(file), len)
                .file_name(file_name)
                .mime_str("application/octet-stream")?;
            form = form.part("file", part);
        }

        let mut url = Self::endpoint(&self.api, "add")?;
        url.query_pairs_mut()
            .append_pair("replication-min", &params.replication_factor_min.to_string())
            .append_pair("replication-max", &params.replication_factor_max.to_string())
            .append_pair("name", &params.name)
            .append_pair("local", if params.local { "true" } else { "false" })
            .append_pair("stream-channels", "true");

        debug!(%url, files = paths.len(), "adding to cluster");
        let response = self
            .authorize(self.http.post(url).multipart(form))
            .send()
            .await?;
        let mut response = check_status(response).await?;

        let mut buffer = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(event) = decode_add_line(&line)? {
                    // A closed receiver means the caller stopped listening.
                    let _ = events.send(event).await;
                }
            }
        }
        if let Some(event) = decode_add_line(&buffer)? {
            let _ = events.send(event).await;
        }
        Ok(())
    }

    async fn cat(&self, cid: &str) -> ClusterResult<ContentReader> {
        let mut url = Self::endpoint(&self.proxy, "api/v0/cat")?;
        url.query_pairs_mut().append_pair("arg", cid);

        let response = self.authorize(self.http.post(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND || body.contains("not found") {
                return Err(ClusterError::ContentNotFound(cid.to_owned()));
            }
            return Err(ClusterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::pin(StreamReader::new(stream)))
    }
}

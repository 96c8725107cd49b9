//! Publishing documents to content-addressed storage

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::config::PublishConfig;
use super::document::PublishPayload;

/// Stable reference to published content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    #[allow(dead_code)]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an upload failed. The workflow reports all of these as one
/// publish failure.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("upload rejected: {0}")]
    Internal(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Remote upload service returning a content identifier
#[async_trait]
pub trait RemotePublisher: Send + Sync {
    async fn publish(&self, payload: &PublishPayload) -> Result<ContentId, PublishError>;
}

#[async_trait]
impl<T: RemotePublisher + ?Sized> RemotePublisher for Arc<T> {
    async fn publish(&self, payload: &PublishPayload) -> Result<ContentId, PublishError> {
        (**self).publish(payload).await
    }
}

/// Serialized body of a published file
fn payload_bytes(payload: &PublishPayload) -> Result<Vec<u8>, PublishError> {
    serde_json::to_vec(payload).map_err(|e| PublishError::Internal(e.to_string()))
}

/// Content identifier derived from the payload bytes
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    let digest = Sha256::digest(bytes);
    ContentId(format!("sha256-{}", hex::encode(digest)))
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    space: &'a str,
    file_name: &'a str,
    content_type: &'static str,
    file: &'a PublishPayload,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: String,
}

/// Uploads payloads to an account space on an HTTP storage gateway
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
    account: String,
    space: String,
    token: Option<String>,
}

impl HttpPublisher {
    pub fn new(
        endpoint: impl Into<String>,
        account: impl Into<String>,
        space: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sheetvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            account: account.into(),
            space: space.into(),
            token,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/spaces/{}/uploads", self.endpoint, self.space)
    }
}

#[async_trait]
impl RemotePublisher for HttpPublisher {
    async fn publish(&self, payload: &PublishPayload) -> Result<ContentId, PublishError> {
        let body = UploadRequest {
            space: &self.space,
            file_name: &payload.name,
            content_type: "application/json",
            file: payload,
        };

        let mut request = self
            .client
            .post(self.upload_url())
            .header("X-Account", &self.account)
            .json(&body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PublishError::Auth(format!(
                "{} for account {} in space {}",
                status, self.account, self.space
            )));
        }
        if !status.is_success() {
            return Err(PublishError::Internal(format!("gateway returned {}", status)));
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Internal(format!("unexpected gateway response: {}", e)))?;
        if upload.cid.is_empty() {
            return Err(PublishError::Internal("gateway returned an empty cid".to_string()));
        }

        tracing::info!("Uploaded {} to space {}", payload.name, self.space);
        Ok(ContentId(upload.cid))
    }
}

/// Content-addressed mirror in a local directory.
///
/// Each payload lands in `<dir>/<cid>.json`; identical payloads share a file.
pub struct LocalPublisher {
    dir: PathBuf,
}

impl LocalPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl RemotePublisher for LocalPublisher {
    async fn publish(&self, payload: &PublishPayload) -> Result<ContentId, PublishError> {
        let bytes = payload_bytes(payload)?;
        let cid = content_id_for(&bytes);

        std::fs::create_dir_all(&self.dir).map_err(|e| PublishError::Internal(e.to_string()))?;
        let path = self.dir.join(format!("{}.json", cid));
        if !path.exists() {
            std::fs::write(&path, &bytes).map_err(|e| PublishError::Internal(e.to_string()))?;
        }

        tracing::info!("Published {} to {}", payload.name, path.display());
        Ok(cid)
    }
}

/// Build the publisher selected by configuration, if any
pub fn from_config(config: &PublishConfig) -> anyhow::Result<Option<Box<dyn RemotePublisher>>> {
    use super::config::PublishMode;

    match config.mode {
        PublishMode::Off => Ok(None),
        PublishMode::Local => {
            let publisher: Box<dyn RemotePublisher> = Box::new(LocalPublisher::new(config.local_dir()));
            Ok(Some(publisher))
        }
        PublishMode::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| anyhow::anyhow!("publish.endpoint is required for http publishing"))?;
            let account = config
                .account
                .clone()
                .ok_or_else(|| anyhow::anyhow!("publish.account is required for http publishing"))?;
            let space = config
                .space
                .clone()
                .ok_or_else(|| anyhow::anyhow!("publish.space is required for http publishing"))?;
            let publisher: Box<dyn RemotePublisher> =
                Box::new(HttpPublisher::new(endpoint, account, space, config.token.clone())?);
            Ok(Some(publisher))
        }
    }
}

//! Pinning-service backend (Pinata-style JSON pinning API plus an IPFS gateway)

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{BlobStore, StoreError};
use crate::crypto::sha256;
use crate::domain::StorageLink;

const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Pinning service configuration
#[derive(Debug, Clone)]
pub struct PinningConfig {
    /// Base URL of the pinning API
    pub api_url: String,
    /// Base URL of the gateway that serves pinned content
    pub gateway_url: String,
    /// Bearer token for the pinning API
    pub jwt: Option<String>,
}

impl PinningConfig {
    pub fn new(api_url: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        Self {
            api_url: trim_base(api_url.into()),
            gateway_url: trim_base(gateway_url.into()),
            jwt: None,
        }
    }

    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("PINNING_API_URL").ok()?;
        let gateway_url =
            std::env::var("PINNING_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let jwt = std::env::var("PINNING_JWT").ok().filter(|s| !s.is_empty());

        Some(Self {
            api_url: trim_base(api_url),
            gateway_url: trim_base(gateway_url),
            jwt,
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Blob store backed by a JSON pinning API
#[derive(Debug, Clone)]
pub struct PinningStore {
    config: PinningConfig,
    client: reqwest::Client,
}

impl PinningStore {
    pub fn new(config: PinningConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(config: PinningConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &PinningConfig {
        &self.config
    }

    /// Gateway URL for a content id
    pub fn gateway_link(&self, cid: &str) -> StorageLink {
        StorageLink::new(format!("{}/ipfs/{}", self.config.gateway_url, cid))
    }

    /// Resolve a stored link to a fetchable URL.
    ///
    /// `ipfs://<cid>` and bare content ids go through the gateway.
    pub fn resolve(&self, link: &StorageLink) -> String {
        let raw = link.as_str().trim();
        if let Some(cid) = raw.strip_prefix("ipfs://") {
            return format!("{}/ipfs/{}", self.config.gateway_url, cid.trim_start_matches("ipfs/"));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }
        format!("{}/ipfs/{}", self.config.gateway_url, raw)
    }
}

#[async_trait]
impl BlobStore for PinningStore {
    async fn upload(&self, blob: &[u8]) -> Result<StorageLink, StoreError> {
        let content = match serde_json::from_slice::<serde_json::Value>(blob) {
            Ok(value) => value,
            Err(_) => {
                let text = std::str::from_utf8(blob)
                    .map_err(|_| StoreError::InvalidBlob("blob is neither JSON nor text".into()))?;
                serde_json::Value::String(text.to_string())
            }
        };

        let digest = sha256(blob).to_hex();
        let name = format!("provenance-{}", &digest[2..18]);
        let body = json!({
            "pinataContent": content,
            "pinataMetadata": { "name": name },
        });

        let url = format!("{}/pinning/pinJSONToIPFS", self.config.api_url);
        let mut request = self.client.post(&url).json(&body);
        if let Some(jwt) = &self.config.jwt {
            request = request.bearer_auth(jwt);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Pinning request failed");
            StoreError::Unavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, "Pinning service rejected upload");
            return Err(StoreError::Unavailable(format!(
                "pinning service returned {status}: {detail}"
            )));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid pinning response: {e}")))?;
        if pinned.ipfs_hash.is_empty() {
            return Err(StoreError::Unavailable(
                "pinning response carried no content id".into(),
            ));
        }

        let link = self.gateway_link(&pinned.ipfs_hash);
        info!(cid = %pinned.ipfs_hash, name = %name, "Blob pinned");
        Ok(link)
    }

    async fn fetch(&self, link: &StorageLink) -> Result<Vec<u8>, StoreError> {
        let url = self.resolve(link);
        debug!(url = %url, "Fetching pinned blob");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(link.clone())),
            status if !status.is_success() => Err(StoreError::Unavailable(format!(
                "gateway returned {status}"
            ))),
            _ => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| StoreError::Unavailable(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "pinning"
    }
}

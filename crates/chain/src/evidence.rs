//! Evidence storage collaborator.
//!
//! Photos of a recycling delivery are pinned to a content-addressed
//! store; the returned identifier travels unchanged into the activity
//! proposal. [`PinataEvidenceStore`] talks to the Pinata pinning API:
//!
//! ```text
//! POST {api}/pinning/pinFileToIPFS   multipart: file + pinataMetadata
//! POST {api}/pinning/pinJSONToIPFS   {"pinataContent": <json>}
//! GET  {gateway}/{cid}               raw bytes
//! ```

use std::time::Duration;

use async_trait::async_trait;
use recicla_common::cid::{public_url, strip_scheme};
use recicla_common::config::EvidenceConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("evidence store request failed: {0}")]
    Http(String),

    #[error("evidence store request timed out")]
    Timeout,

    #[error("evidence store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected evidence store response: {0}")]
    InvalidResponse(String),
}

fn map_reqwest(e: reqwest::Error) -> EvidenceError {
    if e.is_timeout() {
        EvidenceError::Timeout
    } else {
        EvidenceError::Http(e.to_string())
    }
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Pins a file with a small metadata record; returns its content id.
    async fn upload_evidence(&self, file: &EvidenceFile, metadata: &Value) -> Result<String, EvidenceError>;

    /// Pins a JSON document; returns its content id.
    async fn upload_metadata(&self, document: &Value) -> Result<String, EvidenceError>;

    /// Fetches content by id. An `ipfs://` prefix is accepted.
    async fn retrieve(&self, cid: &str) -> Result<Vec<u8>, EvidenceError>;
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

pub struct PinataEvidenceStore {
    config: EvidenceConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for PinataEvidenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataEvidenceStore")
            .field("config", &self.config)
            .field("client", &"reqwest::Client")
            .finish()
    }
}

impl PinataEvidenceStore {
    pub fn new(config: EvidenceConfig) -> Result<Self, EvidenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EvidenceError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn public_url(&self, cid: &str) -> String {
        public_url(&self.config.gateway, cid)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn read_pin_response(response: reqwest::Response) -> Result<String, EvidenceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EvidenceError::Status { status: status.as_u16(), body });
        }
        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| EvidenceError::InvalidResponse(e.to_string()))?;
        Ok(pinned.ipfs_hash)
    }
}

#[async_trait]
impl EvidenceStore for PinataEvidenceStore {
    async fn upload_evidence(&self, file: &EvidenceFile, metadata: &Value) -> Result<String, EvidenceError> {
        info!(file = %file.file_name, bytes = file.bytes.len(), "uploading evidence");
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| EvidenceError::Http(format!("bad content type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("pinataMetadata", metadata.to_string());

        let response = self
            .client
            .post(self.endpoint("/pinning/pinFileToIPFS"))
            .header("pinata_api_key", &self.config.pinata_api_key)
            .header("pinata_secret_api_key", &self.config.pinata_secret_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest)?;

        match Self::read_pin_response(response).await {
            Ok(cid) => {
                info!(cid = %cid, url = %self.public_url(&cid), "evidence pinned");
                Ok(cid)
            }
            Err(e) => {
                error!(error = %e, "evidence upload failed");
                Err(e)
            }
        }
    }

    async fn upload_metadata(&self, document: &Value) -> Result<String, EvidenceError> {
        let response = self
            .client
            .post(self.endpoint("/pinning/pinJSONToIPFS"))
            .header("pinata_api_key", &self.config.pinata_api_key)
            .header("pinata_secret_api_key", &self.config.pinata_secret_key)
            .json(&json!({ "pinataContent": document }))
            .send()
            .await
            .map_err(map_reqwest)?;

        let cid = Self::read_pin_response(response).await?;
        info!(cid = %cid, "metadata pinned");
        Ok(cid)
    }

    async fn retrieve(&self, cid: &str) -> Result<Vec<u8>, EvidenceError> {
        let url = self.public_url(cid);
        info!(cid = strip_scheme(cid), "retrieving evidence");
        let response = self.client.get(&url).send().await.map_err(map_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(EvidenceError::Status { status: status.as_u16(), body: String::new() });
        }
        let bytes = response.bytes().await.map_err(map_reqwest)?;
        Ok(bytes.to_vec())
    }
}

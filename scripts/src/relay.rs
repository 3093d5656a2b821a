//! Submission of assembled proposals to the governance review workflow

use std::path::PathBuf;

use alloy::transports::http::reqwest::{header::CONTENT_TYPE, Client, Url};
use async_trait::async_trait;
use release_common::types::Proposal;
use serde_json::Value;
use tracing::info;

use crate::{
    constants::{JSON_EXTENSION, RELAY_API_KEY_HEADER, RELAY_URL_FIELD},
    errors::ReleaseError,
    utils::write_json_file,
};

/// A service accepting proposals for multisig review
#[async_trait]
pub trait ProposalRelay: Send + Sync {
    /// Submit a proposal, returning where it can be reviewed
    async fn create_proposal(&self, proposal: &Proposal) -> Result<String, ReleaseError>;
}

/// A relay reached over HTTP, accepting proposals as JSON
pub struct HttpRelay {
    /// The HTTP client
    client: Client,
    /// The proposal creation endpoint
    url: Url,
    /// The API key sent with each request, if any
    api_key: Option<String>,
}

impl HttpRelay {
    /// A relay at the given endpoint
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, ReleaseError> {
        let url = Url::parse(url).map_err(|e| ReleaseError::Relay(format!("{url}: {e}")))?;
        Ok(Self {
            client: Client::new(),
            url,
            api_key,
        })
    }
}

#[async_trait]
impl ProposalRelay for HttpRelay {
    async fn create_proposal(&self, proposal: &Proposal) -> Result<String, ReleaseError> {
        let body = serde_json::to_vec(proposal).map_err(|e| ReleaseError::Relay(e.to_string()))?;

        let mut request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.header(RELAY_API_KEY_HEADER, key.as_str());
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReleaseError::Relay(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| ReleaseError::Relay(e.to_string()))?;
        let json: Value =
            serde_json::from_slice(&bytes).map_err(|e| ReleaseError::Relay(e.to_string()))?;

        let url = json
            .get(RELAY_URL_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| ReleaseError::Relay(format!("response has no {RELAY_URL_FIELD}: {json}")))?;

        info!("proposal created at {url}");
        Ok(url.to_string())
    }
}

/// A relay writing proposals to disk, for manual submission
pub struct FileRelay {
    /// The directory proposals are written to
    dir: PathBuf,
    /// The release whose proposals are written
    release: String,
}

impl FileRelay {
    /// A relay writing `<dir>/<release>-proposal.json`
    pub fn new(dir: PathBuf, release: &str) -> Self {
        Self {
            dir,
            release: release.to_string(),
        }
    }
}

#[async_trait]
impl ProposalRelay for FileRelay {
    async fn create_proposal(&self, proposal: &Proposal) -> Result<String, ReleaseError> {
        let path = self
            .dir
            .join(format!("{}-proposal.{JSON_EXTENSION}", self.release));
        write_json_file(&path, proposal).await?;

        info!("proposal written to {}", path.display());
        Ok(path.display().to_string())
    }
}

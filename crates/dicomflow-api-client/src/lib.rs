//! HTTP client for the dicomflow API and the client half of the folder upload
//! pipeline.
//!
//! [`ApiClient`] wraps the `/dicom/*` endpoints. The [`upload`] module walks dropped
//! folders, sniffs DICOM headers, and drives chunked uploads through any
//! [`upload::ChunkTransport`], which `ApiClient` implements.

pub mod api;
pub mod upload;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default request timeout; chunk and whole-file uploads of large studies can be slow.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Where to send requests and which bearer token to send with them.
#[derive(Clone)]
pub struct Session {
    pub base_url: String,
    pub token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Session {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Resolve the session from DICOMFLOW_API_URL (default http://localhost:4000) and
    /// DICOMFLOW_TOKEN. This is the only place a token is looked up.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("DICOMFLOW_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let token = std::env::var("DICOMFLOW_TOKEN")
            .context("Missing bearer token. Set DICOMFLOW_TOKEN")?;
        if token.trim().is_empty() {
            anyhow::bail!("DICOMFLOW_TOKEN is empty");
        }

        Ok(Self::new(base_url, token.trim()))
    }
}

/// Request timeout from DICOMFLOW_UPLOAD_TIMEOUT_SECS, falling back to six hours.
pub fn upload_timeout_from_env() -> Result<Duration> {
    match std::env::var("DICOMFLOW_UPLOAD_TIMEOUT_SECS") {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid DICOMFLOW_UPLOAD_TIMEOUT_SECS: {}", raw))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(DEFAULT_UPLOAD_TIMEOUT),
    }
}

/// HTTP client for the dicomflow API, authenticated with a bearer token.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    session: Session,
}

impl ApiClient {
    pub fn new(session: Session) -> Result<Self> {
        Self::with_timeout(session, DEFAULT_UPLOAD_TIMEOUT)
    }

    pub fn with_timeout(session: Session, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, session })
    }

    /// Create client from environment: DICOMFLOW_API_URL, DICOMFLOW_TOKEN and
    /// DICOMFLOW_UPLOAD_TIMEOUT_SECS.
    pub fn from_env() -> Result<Self> {
        Self::with_timeout(Session::from_env()?, upload_timeout_from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.session.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.session.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.session.token)
    }

    /// Turn a non-2xx response into an error carrying the server's body, otherwise
    /// deserialize the JSON body.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.apply_auth(self.client.get(self.build_url(path)));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.apply_auth(self.client.post(self.build_url(path)).json(body));
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// PATCH JSON body and deserialize response.
    pub async fn patch_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.apply_auth(self.client.patch(self.build_url(path)).json(body));
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let request = self.apply_auth(self.client.post(self.build_url(path)).multipart(form));
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }
}

// crates/cachito-client/src/client.rs
// ============================================================================
// Module: Cachito HTTP Client
// Description: Async client for the Cachito request API.
// Purpose: Create requests, poll them to completion, and fetch their artifacts.
// Dependencies: reqwest, serde_json, tokio, tracing, url
// ============================================================================

//! ## Overview
//! [`CachitoClient`] issues the calls a package scenario needs: create a
//! request, poll it until it reaches a terminal state, download and extract
//! its bundle, and fetch its content manifest and SBOM. Every exchange is
//! captured in a transcript so failing runs can be inspected afterwards.
//! Invariants:
//! - Transient send failures are retried at most [`MAX_HTTP_SEND_ATTEMPTS`] times.
//! - Non-success statuses fail with [`ClientError::Status`] and the body text.
//! - Polling never exceeds [`ClientConfig::completion_timeout`] plus one poll.
//! - API calls are bounded by [`ClientConfig::request_timeout`]; bundle and
//!   reference downloads by [`ClientConfig::download_timeout`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use reqwest::Certificate;
use reqwest::Client;
use reqwest::Identity;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::archive::ArchiveLimits;
use crate::archive::extract_tar_gz;
use crate::auth::AuthConfig;
use crate::error::ClientError;
use crate::types::ApiResponse;
use crate::types::RequestPayload;
use crate::types::RequestState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum attempts for transient HTTP send failures.
pub const MAX_HTTP_SEND_ATTEMPTS: u32 = 3;
/// Base backoff delay for transient HTTP send retries.
const BASE_HTTP_SEND_RETRY_DELAY_MS: u64 = 250;
/// Maximum characters of an error body kept in [`ClientError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 2_048;
/// Default per-call HTTP timeout for API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Default timeout for bundle and reference downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(1_800);
/// Default overall polling budget for a request.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(900);
/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, for example `https://cachito.example.com/api/v1/`.
    pub api_url: String,
    /// Authentication material.
    pub auth: AuthConfig,
    /// Extra PEM CA bundle trusted for TLS.
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Timeout applied to each API call, also used as the connect timeout.
    pub request_timeout: Duration,
    /// Timeout applied to bundle and reference downloads, body included.
    pub download_timeout: Duration,
    /// Overall budget for [`CachitoClient::wait_for_complete_request`].
    pub completion_timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Limits applied when extracting bundles.
    pub archive_limits: ArchiveLimits,
}

impl ClientConfig {
    /// Creates a configuration with default timeouts and no authentication.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            auth: AuthConfig::None,
            ca_cert_pem: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            archive_limits: ArchiveLimits::default(),
        }
    }
}

// ============================================================================
// SECTION: Transcript
// ============================================================================

/// One recorded HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// 1-based position in the transcript.
    pub sequence: u64,
    /// HTTP method.
    pub method: String,
    /// Requested URL.
    pub url: String,
    /// Response status, when a response arrived.
    pub status: Option<u16>,
    /// Transport error, when no response arrived.
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP client for the Cachito API.
#[derive(Clone)]
pub struct CachitoClient {
    /// API base URL with a trailing slash.
    base_url: Url,
    /// Underlying HTTP client.
    client: Client,
    /// Effective configuration.
    config: ClientConfig,
    /// Recorded exchanges.
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl CachitoClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the base URL, CA bundle, or client
    /// identity is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(&config.api_url)?;
        let mut builder = Client::builder().connect_timeout(config.request_timeout);
        if let Some(ca_pem) = &config.ca_cert_pem {
            let cert = Certificate::from_pem(ca_pem)
                .map_err(|err| ClientError::Config(format!("invalid ca cert: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if let AuthConfig::Cert {
            identity_pem,
        } = &config.auth
        {
            let identity = Identity::from_pem(identity_pem)
                .map_err(|err| ClientError::Config(format!("invalid client identity: {err}")))?;
            builder = builder.identity(identity);
        }
        let client = builder
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;
        debug!(
            api_url = %base_url,
            auth = config.auth.auth_type().as_str(),
            "built cachito client"
        );
        Ok(Self {
            base_url,
            client,
            config,
            transcript: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Returns a snapshot of recorded exchanges.
    #[must_use]
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// Submits a new request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails, the service rejects the
    /// payload, or the response lacks a numeric `id`.
    pub async fn create_new_request(
        &self,
        payload: &RequestPayload,
    ) -> Result<ApiResponse, ClientError> {
        let url = self.endpoint("requests")?;
        let response = self
            .send("POST", &url, true, || self.api_call(self.client.post(url.clone()).json(payload)))
            .await?;
        let status = response.status().as_u16();
        let data = decode_json(&url, response).await?;
        let id = data
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClientError::Decode(format!("POST {url} response has no numeric id")))?;
        info!(request_id = id, repo = %payload.repo, git_ref = %payload.git_ref, "submitted request");
        Ok(ApiResponse {
            id,
            status,
            data,
        })
    }

    /// Fetches the current record of a request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails or returns a non-success status.
    pub async fn fetch_request(&self, request_id: u64) -> Result<ApiResponse, ClientError> {
        let url = self.endpoint(&format!("requests/{request_id}"))?;
        self.get_json(request_id, &url).await
    }

    /// Polls a request until the service reports a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] when the completion budget runs out, or
    /// any error raised by [`Self::fetch_request`].
    pub async fn wait_for_complete_request(
        &self,
        response: &ApiResponse,
    ) -> Result<ApiResponse, ClientError> {
        let request_id = response.id;
        let start = Instant::now();
        let mut polls = 0u32;
        loop {
            polls = polls.saturating_add(1);
            let current = self.fetch_request(request_id).await?;
            let state = current.state().unwrap_or_else(|| RequestState::Other(String::new()));
            debug!(request_id, polls, state = state.as_str(), "polled request");
            if state.is_terminal() {
                info!(
                    request_id,
                    state = state.as_str(),
                    elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "request finished"
                );
                return Ok(current);
            }
            let elapsed = start.elapsed();
            if elapsed >= self.config.completion_timeout {
                return Err(ClientError::Timeout {
                    request_id,
                    elapsed,
                    last_state: state.as_str().to_string(),
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Downloads a request bundle into `workdir` and extracts it.
    ///
    /// The archive is stored as `download_{id}.tar.gz` and extracted into
    /// `download_{id}`, whose path is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the download fails, the file cannot be
    /// written, or extraction is rejected.
    pub async fn download_and_extract_archive(
        &self,
        request_id: u64,
        workdir: &Path,
    ) -> Result<PathBuf, ClientError> {
        let url = self.endpoint(&format!("requests/{request_id}/download"))?;
        let mut response = self
            .send("GET", &url, true, || {
                self.client.get(url.clone()).timeout(self.config.download_timeout)
            })
            .await?;
        let archive_path = workdir.join(format!("download_{request_id}.tar.gz"));
        let mut file = tokio::fs::File::create(&archive_path)
            .await
            .map_err(|err| ClientError::Io(format!("create {}: {err}", archive_path.display())))?;
        let mut written = 0u64;
        while let Some(chunk) =
            response.chunk().await.map_err(|err| ClientError::Http(format!("GET {url}: {err}")))?
        {
            file.write_all(&chunk).await.map_err(|err| ClientError::Io(err.to_string()))?;
            written = written.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        }
        file.flush().await.map_err(|err| ClientError::Io(err.to_string()))?;
        drop(file);
        info!(request_id, bytes = written, "downloaded bundle");

        let dest_dir = workdir.join(format!("download_{request_id}"));
        let limits = self.config.archive_limits;
        let archive = archive_path.clone();
        let dest = dest_dir.clone();
        tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest, limits))
            .await
            .map_err(|err| ClientError::Io(format!("extraction task failed: {err}")))??;
        Ok(dest_dir)
    }

    /// Fetches the content manifest of a request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails or returns a non-success status.
    pub async fn fetch_content_manifest(
        &self,
        request_id: u64,
    ) -> Result<ApiResponse, ClientError> {
        let url = self.endpoint(&format!("requests/{request_id}/content-manifest"))?;
        self.get_json(request_id, &url).await
    }

    /// Fetches the merged SBOM of one or more requests.
    ///
    /// The returned [`ApiResponse::id`] is the first requested id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an empty id list, otherwise any
    /// failure of the call.
    pub async fn fetch_sbom(&self, request_ids: &[u64]) -> Result<ApiResponse, ClientError> {
        let Some(first) = request_ids.first().copied() else {
            return Err(ClientError::Config("sbom requires at least one request id".to_string()));
        };
        let joined =
            request_ids.iter().map(u64::to_string).collect::<Vec<String>>().join(",");
        let mut url = self.endpoint("sbom")?;
        url.query_pairs_mut().append_pair("requests", &joined);
        self.get_json(first, &url).await
    }

    /// Fetches an arbitrary URL without API credentials.
    ///
    /// Used for reference files and schema documents hosted outside the API.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the URL is invalid, the call fails, or it
    /// returns a non-success status.
    pub async fn fetch_url(&self, raw_url: &str) -> Result<Vec<u8>, ClientError> {
        let url = Url::parse(raw_url).map_err(|err| ClientError::Url(format!("{raw_url}: {err}")))?;
        let response = self
            .send("GET", &url, false, || {
                self.client.get(url.clone()).timeout(self.config.download_timeout)
            })
            .await?;
        let bytes =
            response.bytes().await.map_err(|err| ClientError::Http(format!("GET {url}: {err}")))?;
        Ok(bytes.to_vec())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Resolves an API path against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url.join(path).map_err(|err| ClientError::Url(format!("{path}: {err}")))
    }

    /// Applies the API call timeout.
    fn api_call(&self, request: RequestBuilder) -> RequestBuilder {
        request.timeout(self.config.request_timeout)
    }

    /// Issues a GET and decodes the JSON body.
    async fn get_json(&self, request_id: u64, url: &Url) -> Result<ApiResponse, ClientError> {
        let response =
            self.send("GET", url, true, || self.api_call(self.client.get(url.clone()))).await?;
        let status = response.status().as_u16();
        let data = decode_json(url, response).await?;
        Ok(ApiResponse {
            id: request_id,
            status,
            data,
        })
    }

    /// Sends a request with retry on transient failures and fails on non-success statuses.
    async fn send<F>(
        &self,
        method: &'static str,
        url: &Url,
        authenticated: bool,
        build: F,
    ) -> Result<Response, ClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        for attempt in 1..=MAX_HTTP_SEND_ATTEMPTS {
            let mut request = build();
            if authenticated && let Some(header) = self.config.auth.authorization_header() {
                request = request.header(AUTHORIZATION, header);
            }
            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    if should_retry_http_send(&err, attempt) {
                        warn!(%url, attempt, error = %err, "retrying http request");
                        sleep(retry_delay_for_attempt(attempt)).await;
                        continue;
                    }
                    self.record(method, url, None, Some(err.to_string()));
                    return Err(ClientError::Http(format!(
                        "{method} {url} failed after {attempt} attempt(s): {err}"
                    )));
                }
            };
            let status = response.status();
            self.record(method, url, Some(status.as_u16()), None);
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::Status {
                    method,
                    url: url.to_string(),
                    status: status.as_u16(),
                    body: truncate_body(&body),
                });
            }
            return Ok(response);
        }
        Err(ClientError::Http(format!("{method} {url} failed: exhausted retry attempts")))
    }

    /// Appends an exchange to the transcript.
    fn record(&self, method: &str, url: &Url, status: Option<u16>, error: Option<String>) {
        let Ok(mut guard) = self.transcript.lock() else {
            return;
        };
        let sequence = u64::try_from(guard.len()).unwrap_or(u64::MAX).saturating_add(1);
        guard.push(TranscriptEntry {
            sequence,
            method: method.to_string(),
            url: url.to_string(),
            status,
            error,
        });
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the API base URL and guarantees a trailing slash for joins.
fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Config("api url must not be empty".to_string()));
    }
    let with_slash =
        if trimmed.ends_with('/') { trimmed.to_string() } else { format!("{trimmed}/") };
    let url = Url::parse(&with_slash)
        .map_err(|err| ClientError::Config(format!("invalid api url {trimmed}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!("unsupported api url scheme: {other}"))),
    }
}

/// Decodes a response body as JSON.
async fn decode_json(url: &Url, response: Response) -> Result<Value, ClientError> {
    response.json::<Value>().await.map_err(|err| ClientError::Decode(format!("{url}: {err}")))
}

/// Truncates an error body to [`MAX_ERROR_BODY_CHARS`].
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}

/// Returns true when an HTTP send failure should be retried.
fn should_retry_http_send(err: &reqwest::Error, attempt: u32) -> bool {
    if attempt >= MAX_HTTP_SEND_ATTEMPTS {
        return false;
    }
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    if !err.is_request() {
        return false;
    }
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("connection reset")
        || msg.contains("connection closed")
        || msg.contains("broken pipe")
        || msg.contains("connection aborted")
        || msg.contains("eof")
}

/// Returns bounded linear backoff for HTTP send retries.
fn retry_delay_for_attempt(attempt: u32) -> Duration {
    Duration::from_millis(u64::from(attempt) * BASE_HTTP_SEND_RETRY_DELAY_MS)
}

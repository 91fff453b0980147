// crates/core/src/backend.rs
//! Backend contract consumed by the orchestrator, plus its HTTP implementation.

use std::time::Duration;

use applytrack_types::{ApiErrorBody, JobId, PollStatusPayload, SyncJob, SyncResultPayload};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::BackendError;

const START_SYNC_PATH: &str = "/api/gmail/sync";
const POLL_STATUS_PATH: &str = "/api/gmail/sync/status";
const CURRENT_STATUS_PATH: &str = "/api/gmail/status";

/// Operations the sync backend exposes.
///
/// Implementations include:
/// - `HttpBackend`: talks to the real server over HTTP
/// - scripted in-memory backends in tests
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Run a sync job to completion. Long-lived: resolves only when the
    /// backend finishes (or rejects).
    async fn start_sync(&self, job: &SyncJob) -> Result<SyncResultPayload, BackendError>;

    /// Progress of a running job.
    async fn poll_status(&self, job_id: &JobId) -> Result<PollStatusPayload, BackendError>;

    /// Outcome of the most recent sync, for the summary panel.
    async fn current_status(&self) -> Result<SyncResultPayload, BackendError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.authorize(req).send().await?;
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()));
        }
        let body = response
            .bytes()
            .await
            .ok()
            .and_then(|b| serde_json::from_slice::<ApiErrorBody>(&b).ok());
        Err(BackendError::from_response(status.as_u16(), body))
    }
}

#[async_trait]
impl SyncBackend for HttpBackend {
    async fn start_sync(&self, job: &SyncJob) -> Result<SyncResultPayload, BackendError> {
        tracing::debug!(job_id = %job.job_id, mode = job.mode.as_str(), "POST start sync");
        let req = self
            .client
            .post(self.config.api_url(START_SYNC_PATH))
            .timeout(self.config.request_timeout)
            .json(&job.to_request());
        self.send(req).await
    }

    async fn poll_status(&self, job_id: &JobId) -> Result<PollStatusPayload, BackendError> {
        let req = self
            .client
            .get(self.config.api_url(POLL_STATUS_PATH))
            .timeout(self.config.poll_timeout)
            .query(&[("syncId", job_id.as_str())]);
        self.send(req).await
    }

    async fn current_status(&self) -> Result<SyncResultPayload, BackendError> {
        let req = self
            .client
            .get(self.config.api_url(CURRENT_STATUS_PATH))
            .timeout(self.config.poll_timeout);
        self.send(req).await
    }
}

//! Batch transcription client.
//!
//! Submits a remotely-stored audio file for asynchronous transcription
//! and polls the job until it reaches a terminal status. The poll loop
//! is written against the [`JobStatusSource`] trait so it can run
//! against a scripted sequence of statuses in tests.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::types::{BatchJob, JobStatus};
use crate::error::RelayError;

/// Parameters for a batch submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    /// Remote location of the audio, e.g. an object-store URI.
    pub source_ref: String,
    /// Container format hint, e.g. "wav" or "mp3".
    pub format: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    job_id: String,
    #[serde(default)]
    source_ref: String,
    status: JobStatus,
    #[serde(default)]
    result_ref: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

impl From<JobResponse> for BatchJob {
    fn from(r: JobResponse) -> Self {
        BatchJob {
            job_id: r.job_id,
            source_ref: r.source_ref,
            status: r.status,
            result_ref: r.result_ref,
            failure_reason: r.failure_reason,
        }
    }
}

/// Anything that can answer "what is the status of job X now".
pub trait JobStatusSource {
    fn poll_status(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<BatchJob, RelayError>> + Send;
}

/// HTTP client for the batch endpoint.
pub struct BatchClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl BatchClient {
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Submit `request` for transcription; returns the job identifier.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<String, RelayError> {
        let url = format!("{}/jobs", self.base_url);
        debug!(source_ref = %request.source_ref, "submitting batch job");

        let response = self
            .authorized(self.http.post(&url).json(request))
            .send()
            .await
            .map_err(|e| RelayError::TransportError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, None));
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RelayError::TransportError(format!("malformed submit response: {}", e)))?;
        info!(job_id = %parsed.job_id, "batch job submitted");
        Ok(parsed.job_id)
    }
}

impl JobStatusSource for BatchClient {
    async fn poll_status(&self, job_id: &str) -> Result<BatchJob, RelayError> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| RelayError::TransportError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, Some(job_id)));
        }

        let parsed: JobResponse = response
            .json()
            .await
            .map_err(|e| RelayError::TransportError(format!("malformed job response: {}", e)))?;
        Ok(parsed.into())
    }
}

fn map_http_error(status: StatusCode, body: &str, job_id: Option<&str>) -> RelayError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::NOT_FOUND => {
            RelayError::JobNotFound(job_id.unwrap_or("<unknown>").to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RelayError::AuthenticationFailure(detail)
        }
        StatusCode::TOO_MANY_REQUESTS => RelayError::Throttled(detail),
        _ => RelayError::TransportError(detail),
    }
}

/// Poll `source` at `interval` until the job reaches a terminal status.
///
/// `on_update` fires after every poll with the latest snapshot. A job
/// that ends in `Failed` is returned as an error carrying the remote
/// failure reason verbatim.
pub async fn wait_for_completion<S, F>(
    source: &S,
    job_id: &str,
    interval: Duration,
    mut on_update: F,
) -> Result<BatchJob, RelayError>
where
    S: JobStatusSource,
    F: FnMut(&BatchJob),
{
    loop {
        let job = source.poll_status(job_id).await?;
        on_update(&job);
        match job.status {
            JobStatus::Completed => return Ok(job),
            JobStatus::Failed => {
                let reason = job
                    .failure_reason
                    .unwrap_or_else(|| "no reason provided".to_string());
                return Err(RelayError::JobFailed(reason));
            }
            JobStatus::Queued | JobStatus::InProgress => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

pub mod classify;

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::AppError;
use crate::models::{RosterStudent, SubmitRequest, SubmitResponse};

pub use classify::{ApiError, Rejection};

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    /// Short on purpose: failing fast into the offline queue is the desired
    /// behavior when the network is degraded.
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("ATTENDANCE_API_URL")
            .map_err(|_| AppError::BadRequest("ATTENDANCE_API_URL is not set".to_string()))?;
        let timeout_ms = env::var("SUBMIT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5_000);

        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Network face of the authoritative store, as seen from a device. Mocked in
/// tests to simulate outages and rejections.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn submit_time_in(&self, req: &SubmitRequest) -> Result<SubmitResponse, ApiError>;
    async fn submit_time_out(&self, req: &SubmitRequest) -> Result<SubmitResponse, ApiError>;
    async fn fetch_roster(&self, teacher_id: &str) -> Result<Vec<RosterStudent>, ApiError>;
}

pub struct AttendanceHttpClient {
    client: Client,
    config: ApiConfig,
}

impl AttendanceHttpClient {
    pub fn new(config: ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_submit(&self, path: &str, req: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .json(req)
            .send()
            .await
            .map_err(classify::classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify::classify_response(status, &body));
        }

        // The server applied the mutation; an unreadable body is safe to
        // retry because the operation is idempotent.
        response
            .json::<SubmitResponse>()
            .await
            .map_err(|e| ApiError::Transport(format!("unreadable response body: {}", e)))
    }
}

#[async_trait]
impl AttendanceApi for AttendanceHttpClient {
    async fn submit_time_in(&self, req: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        self.post_submit("/api/attendance/time-in", req).await
    }

    async fn submit_time_out(&self, req: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        self.post_submit("/api/attendance/time-out", req).await
    }

    async fn fetch_roster(&self, teacher_id: &str) -> Result<Vec<RosterStudent>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/roster/{}", teacher_id)))
            .send()
            .await
            .map_err(classify::classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify::classify_response(status, &body));
        }

        response
            .json::<Vec<RosterStudent>>()
            .await
            .map_err(|e| ApiError::Transport(format!("unreadable roster body: {}", e)))
    }
}

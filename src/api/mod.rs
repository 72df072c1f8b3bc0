//! Platform API Client
//!
//! Single point of outbound HTTP communication with the data platform.
//!
//! # Endpoints
//!
//! ## Health
//! - `GET /api/health` - Liveness check
//!
//! ## Auth
//! - `POST /api/auth/login` - Exchange credentials for a bearer token
//!
//! ## Datasets & Files
//! - `GET /api/datasets` - List datasets
//! - `GET /api/datasets/{id}/files` - List files in a dataset
//! - `POST /api/datasets/{id}/files` - Register a file
//! - `GET /api/files/{id}/download-url` - Signed download URL
//! - `POST /api/files/upload-url?bucket=&objectKey=` - Signed upload URL
//!
//! ## Metrics & Reports
//! - `GET /api/metrics?datasetId=&fileId=` - List metrics
//! - `GET /api/reports?datasetId=&fileId=` - List reports
//! - `POST /api/reports` - Register a report
//!
//! # Example
//!
//! ```rust,no_run
//! use dataplatform::api::{ApiClient, ApiClientConfig, PlatformApi};
//! use dataplatform::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ApiClientConfig::from_env(), Arc::new(MemoryStore::new()))?;
//!     let health = client.health().await?;
//!     println!("{}", health.data);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dto;
pub mod error;

pub use client::{ApiClient, ApiClientConfig, ApiResponse, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
pub use dto::{
    Credentials, Dataset, FileRecord, FileUploadRequest, MetricResult, RecordFilter, Report,
    ReportRequest, SignedUrlResponse, TokenResponse, UploadUrlParams, User,
};
pub use error::{ApiError, ApiResult};

use async_trait::async_trait;

/// The platform API, one method per endpoint.
///
/// [`ApiClient`] is the HTTP implementation; the state store only depends on
/// this trait.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// `GET /api/health`
    async fn health(&self) -> ApiResult<ApiResponse<String>>;

    /// `GET /api/datasets`
    async fn list_datasets(&self) -> ApiResult<ApiResponse<Vec<Dataset>>>;

    /// `GET /api/datasets/{id}/files`
    async fn list_files(&self, dataset_id: &str) -> ApiResult<ApiResponse<Vec<FileRecord>>>;

    /// `POST /api/datasets/{id}/files`
    async fn create_file(
        &self,
        dataset_id: &str,
        payload: &FileUploadRequest,
    ) -> ApiResult<ApiResponse<FileRecord>>;

    /// `GET /api/files/{id}/download-url`
    async fn get_download_url(&self, file_id: &str) -> ApiResult<ApiResponse<SignedUrlResponse>>;

    /// `GET /api/metrics`
    async fn list_metrics(&self, params: &RecordFilter)
        -> ApiResult<ApiResponse<Vec<MetricResult>>>;

    /// `GET /api/reports`
    async fn list_reports(&self, params: &RecordFilter) -> ApiResult<ApiResponse<Vec<Report>>>;

    /// `POST /api/reports`
    async fn create_report(&self, payload: &ReportRequest) -> ApiResult<ApiResponse<Report>>;

    /// `POST /api/auth/login`
    async fn login(&self, credentials: &Credentials) -> ApiResult<ApiResponse<TokenResponse>>;

    /// `POST /api/files/upload-url`
    async fn create_upload_url(
        &self,
        params: &UploadUrlParams,
    ) -> ApiResult<ApiResponse<SignedUrlResponse>>;
}

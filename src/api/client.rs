//! Platform REST API Client
//!
//! HTTP client for the data platform API. Every request shares one timeout and
//! carries the persisted bearer token when there is one.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::dto::{
    Credentials, Dataset, ErrorBody, FileRecord, FileUploadRequest, MetricResult, RecordFilter,
    Report, ReportRequest, SignedUrlResponse, TokenResponse, UploadUrlParams,
};
use super::error::{ApiError, ApiResult};
use super::PlatformApi;
use crate::storage::{persisted_token, SharedStore};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Timeout applied to every request
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "DATAPLATFORM_API_BASE_URL";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the platform API (e.g., "http://localhost:8080")
    pub base_url: String,
    /// Request timeout in milliseconds. Always [`DEFAULT_TIMEOUT_MS`] outside
    /// this crate's tests.
    pub(crate) request_timeout_ms: u64,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ApiClientConfig {
    /// Default configuration with the base URL taken from the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        config
    }

    /// Override the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Request timeout in milliseconds
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    /// Shorten the request timeout so timeout handling can be tested quickly
    #[cfg(test)]
    pub(crate) fn timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }
}

/// A successful response: the HTTP status plus the decoded body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// A 200 response carrying `data`
    pub fn ok(data: T) -> Self {
        Self { status: 200, data }
    }
}

/// Platform REST API client
pub struct ApiClient {
    client: Client,
    config: ApiClientConfig,
    storage: SharedStore,
}

impl ApiClient {
    /// Create a new client. `storage` is consulted for the bearer token before
    /// every request.
    pub fn new(config: ApiClientConfig, storage: SharedStore) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        let config = ApiClientConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };

        Ok(Self {
            client,
            config,
            storage,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Attach `Authorization: Bearer <token>` when a token is persisted
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match persisted_token(self.storage.as_ref()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and reject non-2xx responses
    async fn send(&self, builder: RequestBuilder) -> ApiResult<reqwest::Response> {
        let request = self.authorize(builder).build()?;
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            authenticated = request.headers().contains_key(reqwest::header::AUTHORIZATION),
            "Sending API request"
        );

        let response = self
            .client
            .execute(request)
            .await
            .map_err(ApiError::from_transport)?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> ApiResult<ApiResponse<T>> {
        let response = self.send(builder).await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(ApiError::from_transport)?;
        let data = serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(ApiResponse { status, data })
    }
}

/// Build an error from a rejected response, preferring the server's message
async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.message,
        Err(_) if !text.trim().is_empty() => text,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    tracing::debug!(status = status.as_u16(), message = %message, "API request rejected");

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Health bodies are plain text, or a JSON string when the server serializes one
fn health_message(body: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::String(s)) => s,
        _ => body,
    }
}

fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}

#[async_trait::async_trait]
impl PlatformApi for ApiClient {
    async fn health(&self) -> ApiResult<ApiResponse<String>> {
        let response = self.send(self.client.get(self.url("/api/health"))).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(ApiError::from_transport)?;

        Ok(ApiResponse {
            status,
            data: health_message(body),
        })
    }

    async fn list_datasets(&self) -> ApiResult<ApiResponse<Vec<Dataset>>> {
        self.send_json(self.client.get(self.url("/api/datasets")))
            .await
    }

    async fn list_files(&self, dataset_id: &str) -> ApiResult<ApiResponse<Vec<FileRecord>>> {
        let url = self.url(&format!("/api/datasets/{}/files", segment(dataset_id)));
        self.send_json(self.client.get(url)).await
    }

    async fn create_file(
        &self,
        dataset_id: &str,
        payload: &FileUploadRequest,
    ) -> ApiResult<ApiResponse<FileRecord>> {
        let url = self.url(&format!("/api/datasets/{}/files", segment(dataset_id)));
        self.send_json(self.client.post(url).json(payload)).await
    }

    async fn get_download_url(&self, file_id: &str) -> ApiResult<ApiResponse<SignedUrlResponse>> {
        let url = self.url(&format!("/api/files/{}/download-url", segment(file_id)));
        self.send_json(self.client.get(url)).await
    }

    async fn list_metrics(
        &self,
        params: &RecordFilter,
    ) -> ApiResult<ApiResponse<Vec<MetricResult>>> {
        self.send_json(self.client.get(self.url("/api/metrics")).query(params))
            .await
    }

    async fn list_reports(&self, params: &RecordFilter) -> ApiResult<ApiResponse<Vec<Report>>> {
        self.send_json(self.client.get(self.url("/api/reports")).query(params))
            .await
    }

    async fn create_report(&self, payload: &ReportRequest) -> ApiResult<ApiResponse<Report>> {
        self.send_json(self.client.post(self.url("/api/reports")).json(payload))
            .await
    }

    async fn login(&self, credentials: &Credentials) -> ApiResult<ApiResponse<TokenResponse>> {
        self.send_json(self.client.post(self.url("/api/auth/login")).json(credentials))
            .await
    }

    async fn create_upload_url(
        &self,
        params: &UploadUrlParams,
    ) -> ApiResult<ApiResponse<SignedUrlResponse>> {
        self.send_json(self.client.post(self.url("/api/files/upload-url")).query(params))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, TOKEN_KEY};
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    const VALID_TOKEN: &str = "tok1";

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn require_auth(headers: &HeaderMap) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
        if bearer(headers).as_deref() == Some("Bearer tok1") {
            Ok(())
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "message": "Unauthorized" })),
            ))
        }
    }

    fn mock_platform() -> Router {
        Router::new()
            .route("/api/health", get(|| async { "OK" }))
            .route(
                "/api/auth/login",
                post(|Json(creds): Json<Credentials>| async move {
                    if creds.password == "x" {
                        Ok(Json(TokenResponse {
                            token: VALID_TOKEN.to_string(),
                        }))
                    } else {
                        Err(StatusCode::UNAUTHORIZED)
                    }
                }),
            )
            .route(
                "/api/datasets",
                get(|headers: HeaderMap| async move {
                    require_auth(&headers)?;
                    Ok::<_, (StatusCode, Json<serde_json::Value>)>(Json(serde_json::json!([
                        { "datasetId": "ds-1", "name": "first" }
                    ])))
                }),
            )
            .route(
                "/api/datasets/:id/files",
                get(|Path(id): Path<String>| async move {
                    Json(serde_json::json!([{ "fileId": "f-1", "datasetId": id }]))
                })
                .post(
                    |headers: HeaderMap,
                     Path(id): Path<String>,
                     Json(req): Json<FileUploadRequest>| async move {
                        require_auth(&headers)?;
                        Ok::<_, (StatusCode, Json<serde_json::Value>)>(Json(serde_json::json!({
                            "fileId": req.file_id,
                            "datasetId": id,
                            "filename": req.filename,
                            "bucket": req.bucket,
                            "objectKey": req.object_key,
                            "size": req.size,
                            "contentType": req.content_type,
                            "version": 1,
                            "status": "REGISTERED",
                        })))
                    },
                ),
            )
            .route(
                "/api/files/:id/download-url",
                get(|headers: HeaderMap, Path(id): Path<String>| async move {
                    require_auth(&headers)?;
                    Ok::<_, (StatusCode, Json<serde_json::Value>)>(Json(serde_json::json!({
                        "url": format!("https://s3.local/download/{}", id),
                    })))
                }),
            )
            .route(
                "/api/reports",
                get(
                    |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                        require_auth(&headers)?;
                        // Echo the received query keys back through reportType
                        let mut keys: Vec<_> = params.keys().cloned().collect();
                        keys.sort();
                        Ok::<_, (StatusCode, Json<serde_json::Value>)>(Json(serde_json::json!([{
                            "id": 7,
                            "datasetId": params.get("datasetId").cloned().unwrap_or_default(),
                            "fileId": params.get("fileId").cloned().unwrap_or_default(),
                            "reportType": keys.join(","),
                        }])))
                    },
                )
                .post(
                    |headers: HeaderMap, Json(req): Json<ReportRequest>| async move {
                        require_auth(&headers)?;
                        Ok::<_, (StatusCode, Json<serde_json::Value>)>((
                            StatusCode::CREATED,
                            Json(serde_json::json!({
                                "id": 8,
                                "datasetId": req.dataset_id,
                                "fileId": req.file_id,
                                "reportType": req.report_type,
                                "bucket": req.bucket,
                                "objectKey": req.object_key,
                                "storageType": req.storage_type.unwrap_or_else(|| "S3".to_string()),
                            })),
                        ))
                    },
                ),
            )
            .route(
                "/api/metrics",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    // Echo the received query keys back through metricName
                    let mut keys: Vec<_> = params.keys().cloned().collect();
                    keys.sort();
                    Json(serde_json::json!([{
                        "datasetId": params.get("datasetId").cloned().unwrap_or_default(),
                        "fileId": "f-1",
                        "metricName": keys.join(","),
                    }]))
                }),
            )
            .route(
                "/api/files/upload-url",
                post(
                    |Query(params): Query<UploadUrlParams>, body: String| async move {
                        Json(SignedUrlResponse {
                            url: format!(
                                "https://s3.local/{}/{}?empty_body={}",
                                params.bucket,
                                params.object_key,
                                body.is_empty()
                            ),
                        })
                    },
                ),
            )
            .route(
                "/api/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            )
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn create_test_client(storage: Arc<MemoryStore>) -> ApiClient {
        let base_url = spawn_server(mock_platform()).await;
        ApiClient::new(ApiClientConfig::default().base_url(base_url), storage).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ApiClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ApiClient::new(
            ApiClientConfig::default().base_url("http://api.local/"),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        assert_eq!(client.url("/api/health"), "http://api.local/api/health");
    }

    #[test]
    fn test_health_message_unquotes_json_string() {
        assert_eq!(health_message("\"OK\"".to_string()), "OK");
        assert_eq!(health_message("OK".to_string()), "OK");
        assert_eq!(
            health_message(r#"{"status":"UP"}"#.to_string()),
            r#"{"status":"UP"}"#
        );
    }

    #[tokio::test]
    async fn test_bearer_header_attached_when_token_present() {
        let storage = Arc::new(MemoryStore::with_token(VALID_TOKEN));
        let client = create_test_client(storage).await;

        let response = client.list_datasets().await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].dataset_id, "ds-1");
    }

    #[tokio::test]
    async fn test_header_omitted_without_token() {
        let storage = Arc::new(MemoryStore::new());
        let client = create_test_client(storage).await;

        let err = client.list_datasets().await.unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_read_on_every_request() {
        let storage = Arc::new(MemoryStore::new());
        let client = create_test_client(Arc::clone(&storage)).await;

        assert!(client.list_datasets().await.is_err());

        storage.set_item(TOKEN_KEY, VALID_TOKEN).unwrap();
        assert!(client.list_datasets().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_plain_text() {
        let client = create_test_client(Arc::new(MemoryStore::new())).await;

        let response = client.health().await.unwrap();
        assert_eq!(response.data, "OK");
    }

    #[tokio::test]
    async fn test_login_success_and_failure() {
        let client = create_test_client(Arc::new(MemoryStore::new())).await;

        let ok = client.login(&Credentials::new("alice", "x")).await.unwrap();
        assert_eq!(ok.data.token, "tok1");

        let err = client
            .login(&Credentials::new("alice", "wrong"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        // Empty 401 body falls back to the reason phrase
        assert_eq!(err.to_string(), "API error 401: Unauthorized");
    }

    #[tokio::test]
    async fn test_dataset_id_is_path_encoded() {
        let client = create_test_client(Arc::new(MemoryStore::new())).await;

        let response = client.list_files("ds 1/a").await.unwrap();
        assert_eq!(response.data[0].dataset_id, "ds 1/a");
    }

    #[tokio::test]
    async fn test_absent_filter_fields_not_sent() {
        let client = create_test_client(Arc::new(MemoryStore::new())).await;

        let all = client.list_metrics(&RecordFilter::default()).await.unwrap();
        assert_eq!(all.data[0].metric_name.as_deref(), Some(""));

        let filtered = client
            .list_metrics(&RecordFilter::default().dataset("ds-9"))
            .await
            .unwrap();
        assert_eq!(filtered.data[0].dataset_id, "ds-9");
        assert_eq!(filtered.data[0].metric_name.as_deref(), Some("datasetId"));
    }

    #[tokio::test]
    async fn test_upload_url_uses_query_without_body() {
        let client = create_test_client(Arc::new(MemoryStore::new())).await;

        let params = UploadUrlParams {
            bucket: "raw".to_string(),
            object_key: "ds-1/trace.blf".to_string(),
        };
        let response = client.create_upload_url(&params).await.unwrap();
        assert_eq!(
            response.data.url,
            "https://s3.local/raw/ds-1/trace.blf?empty_body=true"
        );
    }

    #[tokio::test]
    async fn test_create_file_posts_json_body() {
        let client = create_test_client(Arc::new(MemoryStore::with_token(VALID_TOKEN))).await;

        let payload = FileUploadRequest {
            file_id: "f-9".to_string(),
            filename: "trace.blf".to_string(),
            bucket: "raw".to_string(),
            object_key: "ds 1/a/trace.blf".to_string(),
            size: 2048,
            storage_type: None,
            checksum: None,
            content_type: Some("application/octet-stream".to_string()),
            version: None,
            encrypt_flag: None,
            status: None,
        };
        let response = client.create_file("ds 1/a", &payload).await.unwrap();

        assert_eq!(response.status, 200);
        let record = response.data;
        assert_eq!(record.dataset_id, "ds 1/a");
        assert_eq!(record.file_id, "f-9");
        assert_eq!(record.filename.as_deref(), Some("trace.blf"));
        assert_eq!(record.object_key.as_deref(), Some("ds 1/a/trace.blf"));
        assert_eq!(record.size, Some(2048));
        assert_eq!(
            record.content_type.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[tokio::test]
    async fn test_create_file_requires_bearer() {
        let client = create_test_client(Arc::new(MemoryStore::new())).await;

        let payload = FileUploadRequest {
            file_id: "f-9".to_string(),
            filename: "trace.blf".to_string(),
            bucket: "raw".to_string(),
            object_key: "trace.blf".to_string(),
            size: 1,
            storage_type: None,
            checksum: None,
            content_type: None,
            version: None,
            encrypt_flag: None,
            status: None,
        };
        let err = client.create_file("ds-1", &payload).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_download_url_for_encoded_file_id() {
        let client = create_test_client(Arc::new(MemoryStore::with_token(VALID_TOKEN))).await;

        let response = client.get_download_url("f 1/x").await.unwrap();
        assert_eq!(response.data.url, "https://s3.local/download/f 1/x");

        let anonymous = create_test_client(Arc::new(MemoryStore::new())).await;
        let err = anonymous.get_download_url("f-1").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_list_reports_sends_filter_and_bearer() {
        let client = create_test_client(Arc::new(MemoryStore::with_token(VALID_TOKEN))).await;

        let all = client.list_reports(&RecordFilter::default()).await.unwrap();
        assert_eq!(all.data.len(), 1);
        assert_eq!(all.data[0].report_type.as_deref(), Some(""));

        let filtered = client
            .list_reports(&RecordFilter::default().dataset("ds-2").file("f-3"))
            .await
            .unwrap();
        let report = &filtered.data[0];
        assert_eq!(report.id, Some(7));
        assert_eq!(report.dataset_id, "ds-2");
        assert_eq!(report.file_id, "f-3");
        assert_eq!(report.report_type.as_deref(), Some("datasetId,fileId"));

        let anonymous = create_test_client(Arc::new(MemoryStore::new())).await;
        let err = anonymous
            .list_reports(&RecordFilter::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_create_report_posts_json_body() {
        let client = create_test_client(Arc::new(MemoryStore::with_token(VALID_TOKEN))).await;

        let payload = ReportRequest {
            dataset_id: "ds-1".to_string(),
            file_id: "f-1".to_string(),
            bucket: "reports".to_string(),
            object_key: "ds-1/f-1.html".to_string(),
            report_type: Some("QUALITY".to_string()),
            storage_type: None,
        };
        let response = client.create_report(&payload).await.unwrap();

        assert_eq!(response.status, 201);
        let report = response.data;
        assert_eq!(report.id, Some(8));
        assert_eq!(report.dataset_id, "ds-1");
        assert_eq!(report.file_id, "f-1");
        assert_eq!(report.bucket.as_deref(), Some("reports"));
        assert_eq!(report.object_key.as_deref(), Some("ds-1/f-1.html"));
        assert_eq!(report.report_type.as_deref(), Some("QUALITY"));
        assert_eq!(report.storage_type.as_deref(), Some("S3"));

        let anonymous = create_test_client(Arc::new(MemoryStore::new())).await;
        let err = anonymous.create_report(&payload).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_timeout() {
        let base_url = spawn_server(mock_platform()).await;
        let client = ApiClient::new(
            ApiClientConfig::default().base_url(base_url).timeout_ms(100),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();

        let err = client
            .send(client.client.get(client.url("/api/slow")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(
            ApiClientConfig::default().base_url(format!("http://{}", addr)),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::Unavailable(_)));
    }
}

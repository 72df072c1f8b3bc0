//! # Data Platform Client
//!
//! Authenticated client for the data platform: datasets, raw files, signed
//! upload/download URLs, metrics and reports.
//!
//! ## Modules
//!
//! - [`api`]: HTTP client, one method per platform endpoint
//! - [`router`]: Path-to-view mapping with the authentication guard
//! - [`store`]: Application state and the actions that fill it
//! - [`storage`]: Persisted key-value storage holding the bearer token
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dataplatform::{ApiClient, ApiClientConfig, Credentials, FileStore, Router, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(FileStore::new("./session.json"));
//!     let client = Arc::new(ApiClient::new(ApiClientConfig::from_env(), storage.clone())?);
//!     let store = Store::new(client, storage.clone());
//!     let mut router = Router::new(storage);
//!
//!     store.login(&Credentials::new("admin", "admin123")).await?;
//!     router.navigate("/files");
//!
//!     store.fetch_datasets().await?;
//!     println!("{} datasets", store.snapshot().datasets.len());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod router;
pub mod storage;
pub mod store;

// Re-export top-level types for convenience
pub use api::{
    ApiClient, ApiClientConfig, ApiError, ApiResponse, ApiResult, Credentials, Dataset,
    FileRecord, FileUploadRequest, MetricResult, PlatformApi, RecordFilter, Report, ReportRequest,
    SignedUrlResponse, UploadUrlParams, User,
};

pub use router::{GuardDecision, Navigation, Route, Router, ViewLoading};

pub use storage::{
    FileStore, KeyValueStore, MemoryStore, SharedStore, StorageError, StorageResult, TOKEN_KEY,
};

pub use store::{ApiStatus, AppState, Store};

pub use config::{Config, ConfigError, LoggingConfig};

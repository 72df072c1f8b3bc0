//! Application State Store
//!
//! Sole holder of mutable client state. Views call actions; actions call the
//! [`PlatformApi`] and commit results through the mutation primitives.
//!
//! ## Error policy
//!
//! - [`Store::ping_health`] absorbs every failure into `api_status` and
//!   `health_message`.
//! - Every other action returns the API error to its caller and leaves state
//!   as it was.
//!
//! ## Concurrent fetches
//!
//! Each collection hands out an increasing ticket when a fetch starts. A
//! response is committed only if no fetch of the same collection that started
//! later has already been committed, so a slow stale response never
//! overwrites a newer one.
//!
//! The collection setters (`set_datasets` and friends) count as the newest
//! commit. A fetch already in flight when a setter runs is discarded when it
//! resolves; a fetch started after the setter lands as usual.

pub mod state;

pub use state::{ApiStatus, AppState};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::{ApiResult, Credentials, PlatformApi, RecordFilter, User};
use crate::storage::{persisted_token, SharedStore, StorageResult, TOKEN_KEY};
use state::Collection;

/// Fallback health message when an error renders as empty text
pub const UNREACHABLE_MESSAGE: &str = "unreachable";

struct Inner {
    state: AppState,
    /// Ticket of the last committed fetch, per collection
    committed: [u64; Collection::COUNT],
}

/// Explicit state holder shared by views
pub struct Store {
    api: Arc<dyn PlatformApi>,
    storage: SharedStore,
    inner: RwLock<Inner>,
    issued: [AtomicU64; Collection::COUNT],
}

impl Store {
    /// Create a store, loading the token from persisted storage
    pub fn new(api: Arc<dyn PlatformApi>, storage: SharedStore) -> Self {
        let token = persisted_token(storage.as_ref());
        tracing::debug!(authenticated = token.is_some(), "Store initialized");

        Self {
            api,
            storage,
            inner: RwLock::new(Inner {
                state: AppState::with_token(token),
                committed: [0; Collection::COUNT],
            }),
            issued: Default::default(),
        }
    }

    // A panic mid-mutation cannot leave a field half-written, so a poisoned
    // lock still holds consistent state.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Getters
    // ============================================

    /// Clone of the whole state
    pub fn snapshot(&self) -> AppState {
        self.read().state.clone()
    }

    /// True when a token is held
    pub fn is_authenticated(&self) -> bool {
        self.read().state.token.is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().state.user.clone()
    }

    pub fn api_status(&self) -> ApiStatus {
        self.read().state.api_status
    }

    pub fn token(&self) -> Option<String> {
        self.read().state.token.clone()
    }

    // ============================================
    // Mutation primitives
    // ============================================

    pub fn set_api_status(&self, status: ApiStatus) {
        self.write().state.api_status = status;
    }

    pub fn set_health_message(&self, message: impl Into<String>) {
        self.write().state.health_message = message.into();
    }

    pub fn set_user(&self, user: Option<User>) {
        self.write().state.user = user;
    }

    /// Set the token and mirror it into persisted storage.
    ///
    /// `Some` writes the `jwt` entry, `None` (or an empty string) removes it.
    /// In-memory state is updated even when the storage write fails.
    pub fn set_token(&self, token: Option<String>) -> StorageResult<()> {
        let token = token.filter(|t| !t.is_empty());
        self.write().state.token = token.clone();

        match token {
            Some(token) => self.storage.set_item(TOKEN_KEY, &token),
            None => self.storage.remove_item(TOKEN_KEY),
        }
    }

    pub fn set_datasets(&self, datasets: Vec<crate::api::Dataset>) {
        self.replace(Collection::Datasets, |s| s.datasets = datasets);
    }

    pub fn set_files(&self, files: Vec<crate::api::FileRecord>) {
        self.replace(Collection::Files, |s| s.files = files);
    }

    pub fn set_metrics(&self, metrics: Vec<crate::api::MetricResult>) {
        self.replace(Collection::Metrics, |s| s.metrics = metrics);
    }

    pub fn set_reports(&self, reports: Vec<crate::api::Report>) {
        self.replace(Collection::Reports, |s| s.reports = reports);
    }

    // ============================================
    // Actions
    // ============================================

    /// Check API health. Never fails; the outcome lands in state.
    pub async fn ping_health(&self) {
        self.set_api_status(ApiStatus::Loading);

        match self.api.health().await {
            Ok(response) => {
                self.set_health_message(response.data);
                self.set_api_status(ApiStatus::Ready);
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "Health check failed");
                self.set_health_message(if message.is_empty() {
                    UNREACHABLE_MESSAGE.to_string()
                } else {
                    message
                });
                self.set_api_status(ApiStatus::Error);
            }
        }
    }

    /// Log in and keep the returned token.
    ///
    /// The user record is rebuilt from the submitted username; nothing else
    /// from the server response is kept.
    /// When the token cannot be persisted the previous session is restored and
    /// the storage error is returned.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<()> {
        let response = self.api.login(credentials).await?;

        let previous = self.token();
        if let Err(e) = self.set_token(Some(response.data.token)) {
            tracing::warn!(error = %e, "Failed to persist session token");
            self.write().state.token = previous;
            return Err(e.into());
        }
        self.set_user(Some(User {
            username: credentials.username.clone(),
        }));

        tracing::info!(username = %credentials.username, "Logged in");
        Ok(())
    }

    /// Drop the session locally. No server call is made.
    pub fn logout(&self) -> StorageResult<()> {
        let persisted = self.set_token(None);
        self.set_user(None);

        tracing::info!("Logged out");
        persisted
    }

    pub async fn fetch_datasets(&self) -> ApiResult<()> {
        let ticket = self.begin(Collection::Datasets);
        let response = self.api.list_datasets().await?;
        self.commit(Collection::Datasets, ticket, |s| s.datasets = response.data);
        Ok(())
    }

    pub async fn fetch_files(&self, dataset_id: &str) -> ApiResult<()> {
        let ticket = self.begin(Collection::Files);
        let response = self.api.list_files(dataset_id).await?;
        self.commit(Collection::Files, ticket, |s| s.files = response.data);
        Ok(())
    }

    pub async fn fetch_metrics(&self, params: &RecordFilter) -> ApiResult<()> {
        let ticket = self.begin(Collection::Metrics);
        let response = self.api.list_metrics(params).await?;
        self.commit(Collection::Metrics, ticket, |s| s.metrics = response.data);
        Ok(())
    }

    pub async fn fetch_reports(&self, params: &RecordFilter) -> ApiResult<()> {
        let ticket = self.begin(Collection::Reports);
        let response = self.api.list_reports(params).await?;
        self.commit(Collection::Reports, ticket, |s| s.reports = response.data);
        Ok(())
    }

    fn begin(&self, collection: Collection) -> u64 {
        self.issued[collection.index()].fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Unconditional overwrite that also supersedes every fetch in flight
    fn replace<F>(&self, collection: Collection, update: F)
    where
        F: FnOnce(&mut AppState),
    {
        let mut inner = self.write();
        // Issued under the lock so no fetch commit can slip in between
        let ticket = self.begin(collection);
        inner.committed[collection.index()] = ticket;
        update(&mut inner.state);
    }

    /// Apply `update` unless a later-started fetch already committed
    fn commit<F>(&self, collection: Collection, ticket: u64, update: F)
    where
        F: FnOnce(&mut AppState),
    {
        let mut inner = self.write();
        let last = inner.committed[collection.index()];

        if ticket > last {
            inner.committed[collection.index()] = ticket;
            update(&mut inner.state);
        } else {
            tracing::debug!(
                collection = collection.name(),
                ticket,
                last_committed = last,
                "Discarding stale fetch response"
            );
        }
    }
}

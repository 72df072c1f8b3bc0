//! Store State
//!
//! Plain data held by the [`Store`](super::Store). Cloned out as a snapshot
//! whenever a view needs to render.

use serde::Serialize;
use std::fmt;

use crate::api::{Dataset, FileRecord, MetricResult, Report, User};

/// Status of the most recent health check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl ApiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Idle => "idle",
            ApiStatus::Loading => "loading",
            ApiStatus::Ready => "ready",
            ApiStatus::Error => "error",
        }
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All client-observable application state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub api_status: ApiStatus,
    pub health_message: String,
    pub user: Option<User>,
    pub token: Option<String>,
    pub datasets: Vec<Dataset>,
    pub files: Vec<FileRecord>,
    pub metrics: Vec<MetricResult>,
    pub reports: Vec<Report>,
}

impl AppState {
    /// Fresh state with the token loaded from persisted storage
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }
}

/// Collections replaced wholesale by fetch actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Collection {
    Datasets,
    Files,
    Metrics,
    Reports,
}

impl Collection {
    pub(crate) const COUNT: usize = 4;

    pub(crate) fn index(self) -> usize {
        match self {
            Collection::Datasets => 0,
            Collection::Files => 1,
            Collection::Metrics => 2,
            Collection::Reports => 3,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Collection::Datasets => "datasets",
            Collection::Files => "files",
            Collection::Metrics => "metrics",
            Collection::Reports => "reports",
        }
    }
}

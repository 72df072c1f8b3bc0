//! Client Router
//!
//! Maps history-mode URL paths to views and runs the authentication guard
//! before every navigation.
//!
//! | Path       | Route     | Loading |
//! |------------|-----------|---------|
//! | `/`        | Home      | eager   |
//! | `/login`   | Login     | eager   |
//! | `/upload`  | Upload    | lazy    |
//! | `/files`   | Files     | lazy    |
//! | `/metrics` | Metrics   | lazy    |
//! | `/reports` | Reports   | lazy    |
//!
//! The guard only checks that a token is persisted. It does not validate or
//! expire tokens; the server rejects stale ones.

use std::collections::HashSet;
use std::fmt;

use crate::storage::{persisted_token, SharedStore};

/// Path every unauthenticated navigation is redirected to
pub const LOGIN_PATH: &str = "/login";

/// A named client route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Upload,
    Files,
    Metrics,
    Reports,
}

/// When a route's view is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewLoading {
    /// Available from startup
    Eager,
    /// Loaded on first navigation
    Lazy,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Home,
        Route::Login,
        Route::Upload,
        Route::Files,
        Route::Metrics,
        Route::Reports,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => LOGIN_PATH,
            Route::Upload => "/upload",
            Route::Files => "/files",
            Route::Metrics => "/metrics",
            Route::Reports => "/reports",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::Login => "Login",
            Route::Upload => "Upload",
            Route::Files => "Files",
            Route::Metrics => "Metrics",
            Route::Reports => "Reports",
        }
    }

    pub fn loading(&self) -> ViewLoading {
        match self {
            Route::Home | Route::Login => ViewLoading::Eager,
            _ => ViewLoading::Lazy,
        }
    }

    /// Match a normalized path exactly
    pub fn from_path(path: &str) -> Option<Route> {
        Route::ALL.into_iter().find(|r| r.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the global guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Navigation proceeds unchanged
    Allow,
    /// Navigation is replaced by one to the given route
    Redirect(Route),
}

/// Result of a navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The target route is now current
    Resolved {
        route: Route,
        /// True the first time a lazy view is loaded
        first_load: bool,
    },
    /// The guard sent the navigation to the login view instead
    Redirected { requested: String, to: Route },
    /// The guard allowed the path but no route matches it
    NotFound { path: String },
}

/// History-mode router with a single authentication guard
pub struct Router {
    storage: SharedStore,
    current: Option<Route>,
    loaded: HashSet<Route>,
}

impl Router {
    pub fn new(storage: SharedStore) -> Self {
        let loaded = Route::ALL
            .into_iter()
            .filter(|r| r.loading() == ViewLoading::Eager)
            .collect();

        Self {
            storage,
            current: None,
            loaded,
        }
    }

    /// Route currently displayed, `None` before the first navigation
    pub fn current(&self) -> Option<Route> {
        self.current
    }

    /// Whether the route's view has been loaded
    pub fn is_loaded(&self, route: Route) -> bool {
        self.loaded.contains(&route)
    }

    /// The global guard, run before every navigation
    pub fn before_each(&self, path: &str) -> GuardDecision {
        let path = normalize_path(path);
        if path != LOGIN_PATH && persisted_token(self.storage.as_ref()).is_none() {
            GuardDecision::Redirect(Route::Login)
        } else {
            GuardDecision::Allow
        }
    }

    /// Navigate to `path`, applying the guard first
    pub fn navigate(&mut self, path: &str) -> Navigation {
        let normalized = normalize_path(path);

        match self.before_each(&normalized) {
            GuardDecision::Redirect(to) => {
                tracing::debug!(requested = %normalized, to = %to, "Navigation redirected");
                self.enter(to);
                Navigation::Redirected {
                    requested: normalized,
                    to,
                }
            }
            GuardDecision::Allow => match Route::from_path(&normalized) {
                Some(route) => {
                    let first_load = self.enter(route);
                    tracing::debug!(route = %route, first_load, "Navigation resolved");
                    Navigation::Resolved { route, first_load }
                }
                None => {
                    tracing::debug!(path = %normalized, "No route matches path");
                    Navigation::NotFound { path: normalized }
                }
            },
        }
    }

    /// Make `route` current, returning true if its view was loaded just now
    fn enter(&mut self, route: Route) -> bool {
        self.current = Some(route);
        self.loaded.insert(route)
    }
}

/// Strip query and fragment, drop a trailing slash, default to `/`
fn normalize_path(path: &str) -> String {
    let end = path.find(|c| c == '?' || c == '#').unwrap_or(path.len());
    let path = path[..end].trim();
    let path = path.trim_end_matches('/');

    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

//! Permission-scoped control surface over a fleet of LIFX fixtures.
//!
//! The crate parses LIFX selectors, restricts what a non-admin caller may see
//! or address, and decides whether a stored scene is currently realized by the
//! live fixture state.
//!
//! ```
//! use lightscope::{Caller, PermissionSet, Scope, Selector};
//!
//! let caller = Caller::new("7");
//! let permissions = PermissionSet::default().with_fixture("d073d5000001");
//! let scope = Scope::new(caller, permissions);
//!
//! assert!(scope.authorize(&Selector::parse("id:d073d5000001|0-4")));
//! assert_eq!(scope.rewrite_wildcard().unwrap().to_string(), "id:d073d5000001");
//! ```

use std::time::Duration;

pub mod client;
pub mod config;
pub mod control;
pub mod matcher;
pub mod rate;
pub mod resource;
pub mod scope;
pub mod selector;
pub mod status;

pub use client::{LifxClient, StateChange};
pub use config::Config;
pub use control::{Action, ActionOutcome, Controller};
pub use resource::{Fixture, Hsbk, Power, Scene, Target};
pub use scope::{Caller, PermissionSet, Scope};
pub use selector::{Selector, SelectorList, Zone};
pub use status::{all_scene_statuses, check_scene_status, SceneStatus};

#[derive(Debug, thiserror::Error)]
pub enum LightError {
    #[error("invalid selector: {selector:?}")]
    InvalidSelector { selector: String },
    #[error("permission denied for selector {selector:?}")]
    PermissionDenied { selector: String },
    #[error("no lights or groups are available to this user")]
    NoEligibleTargets,
    #[error("no state change requested")]
    EmptyStateChange,
    #[error("scene {id} not found")]
    SceneNotFound { id: String },
    #[error("natural language control is disabled for this user")]
    NlpDisabled,
    #[error("rate limit exceeded, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("upstream error {status}: {msg}")]
    UpstreamError { status: u16, msg: String },
    #[error("configuration error: {msg}")]
    ConfigError { msg: String },
    #[error("A reqwest::Error occured: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("A serde_json::Error occured: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LightError {
    pub(crate) fn invalid_selector(selector: impl Into<String>) -> LightError {
        LightError::InvalidSelector {
            selector: selector.into(),
        }
    }

    pub(crate) fn denied(selector: impl Into<String>) -> LightError {
        LightError::PermissionDenied {
            selector: selector.into(),
        }
    }

    /// The HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            LightError::InvalidSelector { .. } | LightError::EmptyStateChange => 400,
            LightError::PermissionDenied { .. } | LightError::NlpDisabled => 403,
            LightError::SceneNotFound { .. } => 404,
            // nothing to act on is not a failure of the request
            LightError::NoEligibleTargets => 200,
            LightError::RateLimited { .. } => 429,
            LightError::UpstreamError { .. }
            | LightError::ReqwestError(_)
            | LightError::JsonError(_) => 502,
            LightError::ConfigError { .. } => 500,
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LightError::RateLimited { .. } | LightError::ReqwestError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_client_statuses() {
        assert_eq!(LightError::invalid_selector("bogus").status_code(), 400);
        assert_eq!(LightError::denied("id:x").status_code(), 403);
        assert_eq!(LightError::NoEligibleTargets.status_code(), 200);
        assert!(!LightError::denied("id:x").is_retryable());
        assert!(LightError::RateLimited {
            retry_after: Duration::from_secs(3)
        }
        .is_retryable());
    }

    #[test]
    fn rate_limit_message_carries_wait() {
        let err = LightError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry in 42s");
    }
}

//! Validating admission webhook for Elasticsearch resources
//!
//! The API server sends every create and update of an `Elasticsearch`
//! resource here. The handler runs the validation pipelines and answers with
//! an allowed or denied review, plus warnings for discouraged settings.

pub mod elasticsearch;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

/// Path the validating webhook configuration points at
pub const VALIDATE_PATH: &str = "/validate/elasticsearch";

/// Shared state for webhook handlers
#[derive(Clone, Debug, Default)]
pub struct WebhookState {
    /// Namespaces whose resources are validated, empty meaning all
    pub managed_namespaces: Vec<String>,
}

impl WebhookState {
    /// Create a webhook state validating the given namespaces
    pub fn new(managed_namespaces: Vec<String>) -> Self {
        Self { managed_namespaces }
    }

    /// True when resources of `namespace` are validated
    pub fn manages(&self, namespace: Option<&str>) -> bool {
        if self.managed_namespaces.is_empty() {
            return true;
        }
        namespace.is_some_and(|ns| self.managed_namespaces.iter().any(|m| m == ns))
    }
}

/// Create the webhook router
///
/// - POST /validate/elasticsearch - validate Elasticsearch creates and updates
/// - GET /healthz - liveness
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(elasticsearch::validate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manages_namespaces() {
        let all = WebhookState::default();
        assert!(all.manages(Some("search")));
        assert!(all.manages(None));

        let scoped = WebhookState::new(vec!["search".to_string()]);
        assert!(scoped.manages(Some("search")));
        assert!(!scoped.manages(Some("logging")));
        assert!(!scoped.manages(None));
    }
}

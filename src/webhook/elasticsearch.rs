//! Elasticsearch Validation Webhook
//!
//! Handles AdmissionReview requests for Elasticsearch resources. Creates run
//! the create pipeline, updates also compare the proposed resource with the
//! stored one. Every violation is reported in a single denial.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
};
use tracing::{debug, info, warn};

use eskube_common::crd::{Elasticsearch, GROUP, KIND};
use eskube_validation::{check_warnings, validate_create, validate_update, ErrorList};

use super::WebhookState;

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The admission review request was invalid or malformed
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// The object in the review is not a valid Elasticsearch resource
    #[error("cannot decode Elasticsearch resource: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The review lacks an object required by its operation
    #[error("admission request has no {0}")]
    MissingObject(&'static str),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidReview(_) => StatusCode::BAD_REQUEST,
            WebhookError::Serialization(_) | WebhookError::MissingObject(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Handle validating admission reviews for Elasticsearch resources
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let req: AdmissionRequest<DynamicObject> = body
        .try_into()
        .map_err(|e: kube::core::admission::ConvertAdmissionReviewError| {
            WebhookError::InvalidReview(e.to_string())
        })?;
    Ok(Json(review(&state, &req).into_review()))
}

fn decode(obj: Option<&DynamicObject>, what: &'static str) -> Result<Elasticsearch, WebhookError> {
    let obj = obj.ok_or(WebhookError::MissingObject(what))?;
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Message of a denied review, in the API server's invalid-object format
fn denial_message(name: &str, errs: &ErrorList) -> String {
    format!("{KIND}.{GROUP} {name:?} is invalid: {errs}")
}

/// Validate a single admission request
fn review(state: &WebhookState, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let allowed = AdmissionResponse::from(req);
    if !state.manages(req.namespace.as_deref()) {
        debug!(uid = %req.uid, namespace = ?req.namespace, "namespace not managed, skipping validation");
        return allowed;
    }

    let (proposed, errs) = match req.operation {
        Operation::Create => match decode(req.object.as_ref(), "object") {
            Ok(proposed) => {
                let errs = validate_create(&proposed);
                (proposed, errs)
            }
            Err(e) => return allowed.deny(e.to_string()),
        },
        Operation::Update => {
            let decoded = decode(req.old_object.as_ref(), "oldObject")
                .and_then(|current| Ok((current, decode(req.object.as_ref(), "object")?)));
            match decoded {
                Ok((current, proposed)) => {
                    let errs = validate_update(&current, &proposed);
                    (proposed, errs)
                }
                Err(e) => return allowed.deny(e.to_string()),
            }
        }
        _ => return allowed,
    };

    let mut response = allowed;
    let warnings = check_warnings(&proposed);
    if !warnings.is_empty() {
        warn!(uid = %req.uid, cluster = %req.name, warnings = ?warnings, "discouraged configuration");
        response.warnings = Some(warnings);
    }

    if errs.is_empty() {
        debug!(uid = %req.uid, cluster = %req.name, operation = ?req.operation, "admitted");
        return response;
    }
    info!(uid = %req.uid, cluster = %req.name, errors = errs.len(), "denied");
    response.deny(denial_message(&req.name, &errs))
}

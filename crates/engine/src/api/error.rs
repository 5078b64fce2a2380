use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::alarm::RuleError;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed request body: {0}")]
    Body(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rule(RuleError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Rule(RuleError::Duplicate(_)) => StatusCode::CONFLICT,
            Self::Rule(RuleError::InvalidDefinition(_) | RuleError::UnknownOperator(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Rule(RuleError::Storage(_)) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_errors_map_to_status() {
        let cases = [
            (RuleError::NotFound("r".into()), StatusCode::NOT_FOUND),
            (RuleError::Duplicate("r".into()), StatusCode::CONFLICT),
            (RuleError::InvalidDefinition("x".into()), StatusCode::BAD_REQUEST),
            (RuleError::UnknownOperator("=>".into()), StatusCode::BAD_REQUEST),
            (
                RuleError::Storage(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn body_is_json_error() {
        let resp = ApiError::from(RuleError::NotFound("r-1".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"], "rule not found: r-1");
    }
}

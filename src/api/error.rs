//! Mapping of service errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::blockchain::BlockchainError;
use crate::error::CustodyError;

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub CustodyError);

impl<E: Into<CustodyError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CustodyError::Validation(_) => StatusCode::BAD_REQUEST,
            CustodyError::NotFound { .. } => StatusCode::NOT_FOUND,
            CustodyError::Conflict { .. } | CustodyError::Consistency(_) => StatusCode::CONFLICT,
            CustodyError::AuthenticationFailure | CustodyError::MissingCapability { .. } => {
                StatusCode::FORBIDDEN
            }
            CustodyError::Chain(BlockchainError::ConfirmationTimeout { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            CustodyError::Chain(
                BlockchainError::Submission(_) | BlockchainError::Reverted { .. },
            ) => StatusCode::BAD_GATEWAY,
            CustodyError::Chain(_) => StatusCode::SERVICE_UNAVAILABLE,
            CustodyError::Storage(_) | CustodyError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            CustodyError::Validation(_) => "validation",
            CustodyError::NotFound { .. } => "not_found",
            CustodyError::Conflict { .. } => "conflict",
            CustodyError::AuthenticationFailure => "authentication_failure",
            CustodyError::MissingCapability { .. } => "missing_capability",
            CustodyError::Chain(BlockchainError::Submission(_)) => "chain_submission",
            CustodyError::Chain(BlockchainError::Reverted { .. }) => "chain_revert",
            CustodyError::Chain(BlockchainError::ConfirmationTimeout { .. }) => "chain_timeout",
            CustodyError::Chain(_) => "chain_unavailable",
            CustodyError::Consistency(_) => "consistency",
            CustodyError::Storage(_) => "storage",
            CustodyError::Crypto(_) => "crypto",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let mut body = json!({
            "error": self.kind(),
            "message": self.0.to_string(),
        });
        if let CustodyError::Chain(BlockchainError::ConfirmationTimeout { tx_hash, .. }) = &self.0 {
            body["txHash"] = json!(tx_hash.to_string());
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::TxHash;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(CustodyError::Validation("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(CustodyError::not_found("wallet", "0x1")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(CustodyError::AuthenticationFailure).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(BlockchainError::ConfirmationTimeout {
                tx_hash: TxHash::ZERO,
                attempts: 30
            })
            .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(BlockchainError::Submission("nonce too low".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}

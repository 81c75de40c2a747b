use axum::http::StatusCode;

use super::amortization::AmortizationError;
use super::approvals::RequestStatus;
use super::repository::SourceError;

/// Errors surfaced by engine operations. A failed mutation never leaves partial state.
#[derive(Debug, thiserror::Error)]
pub enum LendingError {
    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("request '{request_id}' was already {}", .status.label())]
    AlreadyResolved {
        request_id: String,
        status: RequestStatus,
    },
    #[error(transparent)]
    InvalidAmortizationInput(#[from] AmortizationError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl LendingError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LendingError::Validation { .. } => StatusCode::BAD_REQUEST,
            LendingError::NotFound { .. } => StatusCode::NOT_FOUND,
            LendingError::AlreadyResolved { .. } => StatusCode::CONFLICT,
            LendingError::InvalidAmortizationInput(_) | LendingError::Source(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

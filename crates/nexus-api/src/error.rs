use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use nexus_db::StoreError;
use nexus_types::api::ErrorBody;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authorization required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(e) => match e {
                StoreError::NotFound(_) | StoreError::TargetNotFound => StatusCode::NOT_FOUND,
                StoreError::DuplicateRequest | StoreError::EmailTaken | StoreError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                StoreError::Validation(_) => StatusCode::BAD_REQUEST,
                StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Store(StoreError::Storage(e)) => {
                error!("Storage failure: {:#}", e);
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

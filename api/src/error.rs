use axum::{Json, http::StatusCode, response::IntoResponse};
use mir_ca::CaError;
use mir_common::views::ApiErrorResponse;
use mir_db::storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Ca(#[from] CaError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    InternalAnyhow(#[from] anyhow::Error),
}

/// What a client is told about a failure, and with which status.
enum Kind {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl Kind {
    fn of_store(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound => Kind::NotFound,
            StoreError::Duplicate { .. } => Kind::Conflict,
            _ => Kind::Internal,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Kind::BadRequest => StatusCode::BAD_REQUEST,
            Kind::NotFound => StatusCode::NOT_FOUND,
            Kind::Conflict => StatusCode::CONFLICT,
            Kind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Kind::BadRequest => "BadRequest",
            Kind::NotFound => "NotFound",
            Kind::Conflict => "Conflict",
            Kind::Internal => "InternalError",
        }
    }
}

impl ApiError {
    fn kind(&self) -> Kind {
        match self {
            ApiError::NotFound => Kind::NotFound,
            ApiError::Ca(err) => match err {
                CaError::MalformedRequest(_)
                | CaError::ValidationFailure(_)
                | CaError::InvalidSubject(_) => Kind::BadRequest,
                CaError::OrganizationNotFound(_) => Kind::NotFound,
                CaError::IdentifierUnavailable => Kind::Conflict,
                CaError::Storage(se) => Kind::of_store(se),
                _ => Kind::Internal,
            },
            ApiError::Storage(se) => Kind::of_store(se),
            ApiError::InternalAnyhow(_) => Kind::Internal,
        }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        let kind = err.kind();
        ApiErrorResponse {
            code: Some(kind.code().into()),

            message: match (&kind, &err) {
                (Kind::BadRequest, ApiError::Ca(ce)) => ce.to_string(),
                (Kind::NotFound, _) => "The requested resource was not found.".into(),
                (Kind::Conflict, _) => "No identifier could be allocated for this request.".into(),
                _ => "Something went wrong on our end. Please try again later.".into(),
            },

            #[cfg(debug_assertions)]
            details: Some(err.to_string()),

            #[cfg(not(debug_assertions))]
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Error returned by handler: {self}");

        let status_code = self.kind().status();
        (status_code, Json(Into::<ApiErrorResponse>::into(self))).into_response()
    }
}

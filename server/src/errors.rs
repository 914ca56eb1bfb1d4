use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::identity::IdentityError;

#[derive(Debug)]
pub struct ServerError(pub(crate) color_eyre::Report, pub(crate) StatusCode);

pub type ServerResult<S> = Result<S, ServerError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

fn is_development_mode() -> bool {
    std::env::var("DEVELOPMENT_MODE")
        .map(|v| v == "1")
        .unwrap_or(false)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let ServerError(report, status) = self;

        let message = if status.is_server_error() {
            tracing::error!(error = ?report, %status, "Request Error");

            // Internals only leak in development mode
            if is_development_mode() {
                format!("{report:?}")
            } else {
                status
                    .canonical_reason()
                    .unwrap_or("Internal Server Error")
                    .to_string()
            }
        } else {
            let message = format!("{report:#}");
            tracing::warn!(error = %message, %status, "Request rejected");
            message
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(err: AuthError) -> Self {
        let status = err.status();
        ServerError(err.into(), status)
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        ServerError(color_eyre::eyre::eyre!(rejection.body_text()), status)
    }
}

impl From<IdentityError> for ServerError {
    fn from(err: IdentityError) -> Self {
        AuthError::from(err).into()
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> ServerResult<T>;
}

impl<T> WithStatus<T> for Result<T, color_eyre::Report> {
    fn with_status(self, status: StatusCode) -> ServerResult<T> {
        self.map_err(|err| ServerError(err, status))
    }
}

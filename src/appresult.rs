use axum::{http::StatusCode, response::{IntoResponse, Response}};
use tracing::{debug, error};

use crate::{auth::AuthError, error::ChatError, store::StoreError};

pub type AppResult<T> = Result<T, AppError>;

/// Error of one request. The raw message goes back to the client.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<ChatError>() {
            return match err {
                ChatError::InvalidArgument(_) | ChatError::AlreadyContact(_) => StatusCode::BAD_REQUEST,
                ChatError::NotSignedIn => StatusCode::UNAUTHORIZED,
                ChatError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
                ChatError::Auth(AuthError::Rejected(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        match self.0.downcast_ref::<AuthError>() {
            Some(AuthError::Rejected(_) | AuthError::OAuth(_)) => StatusCode::BAD_REQUEST,
            Some(AuthError::UnknownProvider(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{:#}", self.0);
        } else {
            debug!("{status}: {}", self.0);
        }

        (status, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        let status = |err: AppError| err.status();

        assert_eq!(status(ChatError::NotSignedIn.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ChatError::invalid("x").into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(ChatError::AlreadyContact("bob".into()).into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ChatError::Store(StoreError::NotFound("user bob".into())).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(AuthError::Rejected("EMAIL_EXISTS".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StoreError::Corrupt("x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn message_is_passed_through() {
        let err: AppError = AuthError::Rejected("EMAIL_EXISTS".into()).into();
        assert_eq!(err.0.to_string(), "EMAIL_EXISTS");
    }
}

//! Turns errors into JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{Error, api::ErrorBody};

impl Error {
    /// The HTTP status code the service answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingField(_)
            | Error::InvalidEmail(_)
            | Error::PasswordTooShort(_)
            | Error::EmptyCategoryName
            | Error::InvalidCategory(_)
            | Error::InvalidAmount(_)
            | Error::InvalidBudget(_)
            | Error::InvalidDate(_)
            | Error::InvalidDateRange(_, _)
            | Error::InvalidConfirmationToken
            | Error::JSONSerializationError(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::InvalidToken | Error::InvalidApiKey => {
                StatusCode::UNAUTHORIZED
            }
            Error::EmailNotConfirmed => StatusCode::FORBIDDEN,
            Error::NotFound
            | Error::UpdateMissingCategory
            | Error::DeleteMissingCategory
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingTransaction
            | Error::MissingReminder => StatusCode::NOT_FOUND,
            Error::EmailAlreadyRegistered | Error::DuplicateProfile | Error::DuplicateCategory(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // The details of internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);

            let body = ErrorBody {
                error: "an internal error occurred".to_owned(),
                code: self.code().to_owned(),
                detail: None,
            };

            return (status, Json(body)).into_response();
        }

        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

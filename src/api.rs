//! The JSON types exchanged between the hosted service and its clients.
//!
//! Both sides of the wire use these types, so the service and the remote backend client cannot
//! drift apart. Errors travel as an [ErrorBody] whose `code` identifies the [Error] variant.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    DateRange, Error,
    transaction::parse_date,
    user::AuthUser,
};

/// The name of the header that carries the service's API key.
pub const API_KEY_HEADER: &str = "apikey";

/// A signed-in session: an access and refresh token pair for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Sent as a bearer token with every authenticated request.
    pub access_token: String,
    /// Exchanged for a new token pair when the access token expires.
    pub refresh_token: String,
    /// When the access token stops being accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// The signed-in user.
    pub user: AuthUser,
}

/// The body of a sign up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    /// The display name of the new user.
    pub name: String,
    /// The email address to sign in with.
    pub email: String,
    /// The password to sign in with.
    pub password: String,
}

/// The response to a sign up request.
///
/// `session` is `None` when the service requires the email address to be confirmed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpResponse {
    /// The newly registered user.
    pub user: AuthUser,
    /// The session, if the user was signed in immediately.
    pub session: Option<AuthSession>,
}

/// The body of a password sign in request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordGrant {
    /// The email address of the user.
    pub email: String,
    /// The user's password.
    pub password: String,
}

/// The body of a token refresh request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshGrant {
    /// The refresh token from the current session.
    pub refresh_token: String,
}

/// A request that only names an email address, e.g. resending the confirmation email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    /// The email address.
    pub email: String,
}

/// The body of an email confirmation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// The token that was sent to the user.
    pub token: String,
}

/// The query string for listing transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// The first date to include, "YYYY-MM-DD".
    pub start: Option<String>,
    /// The last date to include, "YYYY-MM-DD".
    pub end: Option<String>,
}

impl TransactionQuery {
    /// The query for `range`.
    pub fn from_range(range: DateRange) -> Self {
        Self {
            start: Some(range.start().to_string()),
            end: Some(range.end().to_string()),
        }
    }

    /// Parse the query into a date range, `None` if neither bound is given.
    ///
    /// A missing bound is taken from the other one, so `?start=2025-01-01` selects a single day.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDate] if a bound is not a valid date and [Error::InvalidDateRange]
    /// if the start is after the end.
    pub fn date_range(&self) -> Result<Option<DateRange>, Error> {
        let start = self.start.as_deref().map(parse_date).transpose()?;
        let end = self.end.as_deref().map(parse_date).transpose()?;

        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), None) => DateRange::new(start, start).map(Some),
            (None, Some(end)) => DateRange::new(end, end).map(Some),
            (Some(start), Some(end)) => DateRange::new(start, end).map(Some),
        }
    }
}

/// The body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// A human readable description of the error.
    pub error: String,
    /// A machine readable error code, see [Error::code].
    pub code: String,
    /// The value the error is about, e.g. the name of a duplicate category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        Self {
            error: error.to_string(),
            code: error.code().to_owned(),
            detail: error.detail(),
        }
    }
}

impl Error {
    /// The machine readable code sent in [ErrorBody::code].
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingField(_) => "missing_field",
            Error::InvalidEmail(_) => "invalid_email",
            Error::PasswordTooShort(_) => "password_too_short",
            Error::InvalidCredentials => "invalid_credentials",
            Error::EmailNotConfirmed => "email_not_confirmed",
            Error::EmailAlreadyRegistered => "email_exists",
            Error::InvalidToken => "invalid_token",
            Error::InvalidApiKey => "invalid_api_key",
            Error::InvalidConfirmationToken => "invalid_confirmation_token",
            Error::DuplicateProfile => "duplicate_profile",
            Error::EmptyCategoryName => "empty_category_name",
            Error::DuplicateCategory(_) => "duplicate_category",
            Error::InvalidCategory(_) => "invalid_category",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InvalidBudget(_) => "invalid_budget",
            Error::InvalidDate(_) => "invalid_date",
            Error::InvalidDateRange(_, _) => "invalid_date_range",
            Error::NotFound => "not_found",
            Error::UpdateMissingCategory => "update_missing_category",
            Error::DeleteMissingCategory => "delete_missing_category",
            Error::UpdateMissingTransaction => "update_missing_transaction",
            Error::DeleteMissingTransaction => "delete_missing_transaction",
            Error::MissingReminder => "missing_reminder",
            Error::JSONSerializationError(_) => "invalid_json",
            Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::StorageLockError
            | Error::StorageIo(_)
            | Error::CorruptStorage { .. }
            | Error::UnsupportedSchemaVersion { .. }
            | Error::Network(_)
            | Error::Backend { .. }
            | Error::NotLoggedIn => "internal_error",
        }
    }

    /// The value carried by the error, sent in [ErrorBody::detail].
    pub fn detail(&self) -> Option<String> {
        match self {
            Error::MissingField(field) => Some(field.clone()),
            Error::InvalidEmail(email) => Some(email.clone()),
            Error::PasswordTooShort(length) => Some(length.to_string()),
            Error::DuplicateCategory(name) => Some(name.clone()),
            Error::InvalidCategory(id) => id.map(|id| id.to_string()),
            Error::InvalidAmount(amount) => Some(amount.to_string()),
            Error::InvalidBudget(budget) => Some(budget.to_string()),
            Error::InvalidDate(date) => Some(date.clone()),
            Error::InvalidDateRange(start, end) => Some(format!("{start},{end}")),
            _ => None,
        }
    }

    /// Rebuild an error from an error response.
    ///
    /// Codes without a matching variant, and details that cannot be parsed, become
    /// [Error::Backend].
    pub fn from_response(status: u16, body: ErrorBody) -> Self {
        let detail = body.detail.clone().unwrap_or_default();

        let error = match body.code.as_str() {
            "missing_field" => Some(Error::MissingField(detail)),
            "invalid_email" => Some(Error::InvalidEmail(detail)),
            "password_too_short" => detail.parse().ok().map(Error::PasswordTooShort),
            "invalid_credentials" => Some(Error::InvalidCredentials),
            "email_not_confirmed" => Some(Error::EmailNotConfirmed),
            "email_exists" => Some(Error::EmailAlreadyRegistered),
            "invalid_token" => Some(Error::InvalidToken),
            "invalid_api_key" => Some(Error::InvalidApiKey),
            "invalid_confirmation_token" => Some(Error::InvalidConfirmationToken),
            "duplicate_profile" => Some(Error::DuplicateProfile),
            "empty_category_name" => Some(Error::EmptyCategoryName),
            "duplicate_category" => Some(Error::DuplicateCategory(detail)),
            "invalid_category" => Some(Error::InvalidCategory(detail.parse().ok())),
            "invalid_amount" => detail.parse().ok().map(Error::InvalidAmount),
            "invalid_budget" => detail.parse().ok().map(Error::InvalidBudget),
            "invalid_date" => Some(Error::InvalidDate(detail)),
            "invalid_date_range" => detail.split_once(',').and_then(|(start, end)| {
                Some(Error::InvalidDateRange(
                    parse_date(start).ok()?,
                    parse_date(end).ok()?,
                ))
            }),
            "not_found" => Some(Error::NotFound),
            "update_missing_category" => Some(Error::UpdateMissingCategory),
            "delete_missing_category" => Some(Error::DeleteMissingCategory),
            "update_missing_transaction" => Some(Error::UpdateMissingTransaction),
            "delete_missing_transaction" => Some(Error::DeleteMissingTransaction),
            _ => None,
        };

        error.unwrap_or(Error::Backend {
            status,
            message: body.error,
        })
    }
}


#[cfg(test)]
mod transaction_query_tests {
    use time::macros::date;

    use crate::{DateRange, Error, api::TransactionQuery};

    #[test]
    fn empty_query_has_no_range() {
        assert_eq!(TransactionQuery::default().date_range(), Ok(None));
    }

    #[test]
    fn query_parses_both_bounds() {
        let query = TransactionQuery {
            start: Some("2025-01-01".to_owned()),
            end: Some("2025-01-31".to_owned()),
        };

        assert_eq!(
            query.date_range(),
            Ok(Some(
                DateRange::new(date!(2025 - 01 - 01), date!(2025 - 01 - 31)).unwrap()
            ))
        );
    }

    #[test]
    fn query_rejects_bad_date() {
        let query = TransactionQuery {
            start: Some("01/01/2025".to_owned()),
            end: None,
        };

        assert_eq!(
            query.date_range(),
            Err(Error::InvalidDate("01/01/2025".to_owned()))
        );
    }

    #[test]
    fn from_range_round_trips() {
        let range = DateRange::month_of(date!(2024 - 02 - 10));

        assert_eq!(TransactionQuery::from_range(range).date_range(), Ok(Some(range)));
    }
}

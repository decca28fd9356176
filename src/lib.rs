//! Budget Tracker is a personal finance tracker for recording income and
//! expenses, organising them into categories and tracking spending against
//! budgets.
//!
//! The crate has two halves:
//! - the hosted [service], a JSON API backed by SQLite that owns user
//!   accounts, sessions, profiles, categories and transactions, and scopes
//!   every query to the authenticated user;
//! - the client core: the [session] manager that signs users in against the
//!   [backend] (or the [mock_store] for the demo account), typed [storage]
//!   for client-side state, the [local_ledger] for demo data, and pure
//!   [aggregation] helpers for summaries.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use time::Date;
use tokio::signal;

pub mod aggregation;
pub mod api;
pub mod backend;
pub mod category;
pub mod config;
pub mod local_ledger;
pub mod mock_store;
pub mod password;
pub mod planner;
pub mod service;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod user;

pub use category::{Category, CategoryData, CategoryId, CategoryName, TransactionKind};
pub use password::{MIN_PASSWORD_LENGTH, PasswordHash, ValidatedPassword};
pub use transaction::{DateRange, Transaction, TransactionData, TransactionId};
pub use user::{Profile, SessionUser, UserID};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(String),

    /// The string could not be parsed as an email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The password has fewer characters than the minimum length.
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),

    /// The email and password did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The user tried to sign in before confirming their email address.
    #[error("the email address has not been confirmed")]
    EmailNotConfirmed,

    /// The email address is already used by another account.
    ///
    /// Clients should suggest logging in instead.
    #[error("an account with this email already exists")]
    EmailAlreadyRegistered,

    /// The access or refresh token is missing, unknown or expired.
    #[error("the session token is missing, invalid or expired")]
    InvalidToken,

    /// The request did not carry the service's API key.
    #[error("the API key is missing or invalid")]
    InvalidApiKey,

    /// The email confirmation token does not match any pending account.
    #[error("the confirmation token is invalid")]
    InvalidConfirmationToken,

    /// A profile has already been created for the user.
    #[error("a profile already exists for this user")]
    DuplicateProfile,

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// The user already has a category with the same name and type.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategory(String),

    /// The category ID used for a transaction does not refer to a category
    /// owned by the same user with the same transaction type.
    #[error("the category ID {0:?} does not refer to a valid category for this transaction")]
    InvalidCategory(Option<CategoryId>),

    /// Transaction amounts must be positive, finite numbers.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// Budgets must be non-negative, finite numbers.
    #[error("{0} is not a valid budget, budgets cannot be negative")]
    InvalidBudget(f64),

    /// A date string could not be parsed.
    #[error("\"{0}\" is not a valid date, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The start of a date range is after its end.
    #[error("the start date {0} is after the end date {1}")]
    InvalidDateRange(Date, Date),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a category that does not exist
    #[error("tried to update a category that does not exist")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that does not exist")]
    DeleteMissingCategory,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that does not exist")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that does not exist")]
    DeleteMissingTransaction,

    /// Tried to pay a reminder that does not exist
    #[error("tried to pay a reminder that does not exist")]
    MissingReminder,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Could not acquire the local storage lock
    #[error("could not acquire the local storage lock")]
    StorageLockError,

    /// Reading or writing the local storage file failed.
    #[error("could not access local storage: {0}")]
    StorageIo(String),

    /// A local storage value could not be decoded.
    #[error("the local storage value for \"{key}\" is malformed: {message}")]
    CorruptStorage {
        /// The storage key holding the malformed value.
        key: String,
        /// The decoding error.
        message: String,
    },

    /// Local storage was written by a newer version of the application.
    #[error("local storage schema version {found} is newer than the supported version {supported}")]
    UnsupportedSchemaVersion {
        /// The version found in storage.
        found: u32,
        /// The newest version this build understands.
        supported: u32,
    },

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// The backend could not be reached.
    #[error("could not reach the backend: {0}")]
    Network(String),

    /// The backend answered with an error that has no matching variant.
    #[error("the backend returned an error ({status}): {message}")]
    Backend {
        /// The HTTP status code.
        status: u16,
        /// The error message from the response body.
        message: String,
    },

    /// The operation needs a signed-in user.
    #[error("you are not logged in")]
    NotLoggedIn,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("auth_user.email") =>
            {
                Error::EmailAlreadyRegistered
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("category.") =>
            {
                Error::DuplicateCategory(String::new())
            }
            // Code 1555 occurs when a PRIMARY KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 1555 && desc.contains("profile.") =>
            {
                Error::DuplicateProfile
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

//! The interfaces the client uses to talk to a backend.
//!
//! [AuthBackend] covers accounts, sessions and profiles. [Ledger] covers the categories and
//! transactions of one signed-in user, and [DataBackend] hands out a [Ledger] for an access
//! token. [RemoteBackend] implements all three over HTTP, and the session manager's tests use
//! in-process doubles.

mod remote;

pub use remote::{RemoteBackend, RemoteLedger};

use async_trait::async_trait;

use crate::{
    Category, CategoryData, CategoryId, DateRange, Error, Profile, Transaction, TransactionData,
    TransactionId,
    api::{AuthSession, SignUpRequest},
    user::{AuthUser, NewProfile, ProfileUpdate},
};

/// The result of a successful sign up.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The user was signed in straight away.
    SignedIn(AuthSession),
    /// The user must confirm their email address before signing in.
    ConfirmationPending(AuthUser),
}

/// Account, session and profile operations.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Register a new account.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, Error>;

    /// Exchange an email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, Error>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, Error>;

    /// Revoke the session the access token belongs to.
    async fn sign_out(&self, access_token: &str) -> Result<(), Error>;

    /// Send the email confirmation again.
    async fn resend_confirmation(&self, email: &str) -> Result<(), Error>;

    /// Get the profile of the signed-in user, `None` if it has not been created yet.
    async fn get_profile(&self, access_token: &str) -> Result<Option<Profile>, Error>;

    /// Create the profile of the signed-in user.
    async fn create_profile(
        &self,
        access_token: &str,
        profile: &NewProfile,
    ) -> Result<Profile, Error>;

    /// Update the profile of the signed-in user.
    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, Error>;
}

/// Category and transaction operations for one user.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// All of the user's categories.
    async fn categories(&self) -> Result<Vec<Category>, Error>;

    /// Create a category.
    async fn create_category(&self, data: CategoryData) -> Result<Category, Error>;

    /// Replace the editable fields of a category.
    async fn update_category(&self, id: CategoryId, data: CategoryData) -> Result<Category, Error>;

    /// Delete a category. Transactions in the category are kept without a category.
    async fn delete_category(&self, id: CategoryId) -> Result<(), Error>;

    /// The user's transactions, newest first, optionally limited to a date range.
    async fn transactions(&self, range: Option<DateRange>) -> Result<Vec<Transaction>, Error>;

    /// Create a transaction.
    async fn create_transaction(&self, data: TransactionData) -> Result<Transaction, Error>;

    /// Replace the editable fields of a transaction.
    async fn update_transaction(
        &self,
        id: TransactionId,
        data: TransactionData,
    ) -> Result<Transaction, Error>;

    /// Delete a transaction.
    async fn delete_transaction(&self, id: TransactionId) -> Result<(), Error>;
}

/// Hands out the [Ledger] of the user an access token belongs to.
pub trait DataBackend {
    /// The ledger scoped to `access_token`.
    fn ledger(&self, access_token: &str) -> Box<dyn Ledger>;
}

//! Implements a struct that holds the state of the service.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRef;
use rusqlite::Connection;
use time::Duration;

use crate::{Error, PasswordHash, service::db::initialize};

/// How long access tokens are valid for unless configured otherwise.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::minutes(60);

/// The settings of the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// The key every request must carry in the `apikey` header.
    pub api_key: String,
    /// How long access tokens are valid for.
    pub session_duration: Duration,
    /// Whether new users must confirm their email address before signing in.
    pub require_email_confirmation: bool,
    /// The bcrypt cost for hashing passwords.
    pub password_hash_cost: u32,
}

impl ServiceConfig {
    /// Create a config with the default settings.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_owned(),
            session_duration: DEFAULT_SESSION_DURATION,
            require_email_confirmation: false,
            password_hash_cost: PasswordHash::DEFAULT_COST,
        }
    }

    /// Set how long access tokens are valid for.
    pub fn session_duration(mut self, session_duration: Duration) -> Self {
        self.session_duration = session_duration;
        self
    }

    /// Set whether new users must confirm their email address.
    pub fn require_email_confirmation(mut self, require_email_confirmation: bool) -> Self {
        self.require_email_confirmation = require_email_confirmation;
        self
    }

    /// Set the bcrypt cost, lower values are only suitable for tests.
    pub fn password_hash_cost(mut self, password_hash_cost: u32) -> Self {
        self.password_hash_cost = password_hash_cost;
        self
    }
}

/// The state of the service.
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The service settings.
    pub config: ServiceConfig,
}

impl ServiceState {
    /// Create the service state with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, config: ServiceConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            config,
        })
    }

    /// Lock the database connection.
    ///
    /// # Errors
    ///
    /// Returns [Error::DatabaseLockError] if the lock is poisoned.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }
}

/// The state needed by the data routes.
#[derive(Debug, Clone)]
pub struct DataState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<ServiceState> for DataState {
    fn from_ref(state: &ServiceState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

impl DataState {
    /// Lock the database connection.
    ///
    /// # Errors
    ///
    /// Returns [Error::DatabaseLockError] if the lock is poisoned.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }
}

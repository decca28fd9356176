//! The session manager: registration, login, logout and the cached session.
//!
//! The manager decides what backs each call. The demo account (and every account while running
//! offline) goes to the in-process [MockStore], everything else goes to the [AuthBackend]. Either
//! way the result is normalized into an [AuthResult] and the session is cached in local storage.
//!
//! Auth operations never return an error. Failures are reported as an [AuthResult] with
//! `success == false` and a message for the user.

mod retry;

pub use retry::RetryPolicy;

use std::sync::Mutex;

use time::OffsetDateTime;

use crate::{
    Error, Profile, SessionUser, ValidatedPassword,
    api::{AuthSession, SignUpRequest},
    backend::{AuthBackend, DataBackend, Ledger, SignUpOutcome},
    local_ledger::LocalLedger,
    mock_store::{MockSession, MockStore, is_demo_credentials, is_demo_email},
    planner::Planner,
    storage::{KeyValueStore, LocalStorage, SharedStorage, StorageKey, lock},
    user::{NewProfile, ProfileUpdate, normalize_email},
};

/// The message shown when registering with an email address that is already in use.
pub const ALREADY_REGISTERED_MESSAGE: &str =
    "An account with this email already exists. Please log in instead.";

/// The outcome of an auth operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The signed-in user.
    pub user: Option<SessionUser>,
    /// The access token of the session.
    pub token: Option<String>,
    /// Why the operation failed.
    pub error: Option<String>,
    /// Set when registration succeeded but the email address must be confirmed before logging in.
    pub confirmation_pending: bool,
}

impl AuthResult {
    fn signed_in(user: SessionUser, token: String) -> Self {
        Self {
            success: true,
            user: Some(user),
            token: Some(token),
            error: None,
            confirmation_pending: false,
        }
    }

    fn succeeded() -> Self {
        Self {
            success: true,
            user: None,
            token: None,
            error: None,
            confirmation_pending: false,
        }
    }

    fn confirmation_pending() -> Self {
        Self {
            confirmation_pending: true,
            ..Self::succeeded()
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            token: None,
            error: Some(message.into()),
            confirmation_pending: false,
        }
    }

    fn from_error(error: &Error) -> Self {
        match error {
            Error::EmailAlreadyRegistered => Self::failed(ALREADY_REGISTERED_MESSAGE),
            error => Self::failed(error.to_string()),
        }
    }
}

/// Notifications about changes to the session, e.g. from a background token refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A user signed in.
    SignedIn(AuthSession),
    /// The tokens of the current session were replaced.
    TokenRefreshed(AuthSession),
    /// The user's profile changed.
    UserUpdated(Profile),
    /// The user signed out, or the session was revoked.
    SignedOut,
}

/// Settings for the [SessionManager].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// How to retry fetching or creating the profile after signing in.
    pub retry: RetryPolicy,
    /// Route every account to the mock store instead of the backend.
    pub offline: bool,
}

/// Signs users in and out and keeps the session in local storage.
pub struct SessionManager<B, S> {
    backend: B,
    mock_store: Mutex<MockStore>,
    storage: SharedStorage<S>,
    options: SessionOptions,
}

impl<B: AuthBackend, S: KeyValueStore> SessionManager<B, S> {
    /// Create a session manager with the default options.
    pub fn new(backend: B, storage: SharedStorage<S>) -> Self {
        Self {
            backend,
            mock_store: Mutex::new(MockStore::new()),
            storage,
            options: SessionOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// The backend the manager signs users in with.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The local storage the session is cached in.
    pub fn storage(&self) -> &SharedStorage<S> {
        &self.storage
    }

    /// Register a new account.
    ///
    /// The name, email and password are validated before the backend is contacted. On success
    /// the user is either signed in or `confirmation_pending` is set.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult {
        let name = name.trim();
        if name.is_empty() {
            return AuthResult::from_error(&Error::MissingField("name".to_owned()));
        }

        let email = match normalize_email(email) {
            Ok(email) => email,
            Err(error) => return AuthResult::from_error(&error),
        };

        if let Err(error) = ValidatedPassword::new(password) {
            return AuthResult::from_error(&error);
        }

        if is_demo_email(&email) {
            return AuthResult::from_error(&Error::EmailAlreadyRegistered);
        }

        if self.options.offline {
            let session = match self.mock_store_register(name, &email, password) {
                Ok(session) => session,
                Err(error) => return AuthResult::from_error(&error),
            };

            return self.start_local_session(session);
        }

        let request = SignUpRequest {
            name: name.to_owned(),
            email,
            password: password.to_owned(),
        };

        match self.backend.sign_up(&request).await {
            Ok(SignUpOutcome::SignedIn(session)) => self.start_session(session).await,
            Ok(SignUpOutcome::ConfirmationPending(user)) => {
                tracing::info!("Registered {}, waiting for email confirmation", user.email);
                AuthResult::confirmation_pending()
            }
            Err(error) => {
                tracing::warn!("Registration failed: {error}");
                AuthResult::from_error(&error)
            }
        }
    }

    /// Log in with an email address and password.
    ///
    /// The demo credentials are checked against the mock store and never reach the backend.
    /// All other credentials go to the backend only.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult {
        if password.is_empty() {
            return AuthResult::from_error(&Error::MissingField("password".to_owned()));
        }

        let email = match normalize_email(email) {
            Ok(email) => email,
            Err(error) => return AuthResult::from_error(&error),
        };

        if self.options.offline || is_demo_credentials(&email, password) {
            let session = match self.mock_store_login(&email, password) {
                Ok(session) => session,
                Err(error) => return AuthResult::from_error(&error),
            };

            return self.start_local_session(session);
        }

        match self.backend.sign_in(&email, password).await {
            Ok(session) => self.start_session(session).await,
            Err(error) => {
                tracing::warn!("Login failed for {email}: {error}");
                AuthResult::from_error(&error)
            }
        }
    }

    /// Log out, clearing the cached session and data.
    ///
    /// The backend session is revoked on a best effort basis, logging out always succeeds.
    pub async fn logout(&self) -> AuthResult {
        let remote_token = match self.cached_session_kind() {
            Ok(Some((token, false))) => Some(token),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!("Could not read the cached session: {error}");
                None
            }
        };

        if let Some(token) = remote_token {
            if let Err(error) = self.backend.sign_out(&token).await {
                tracing::warn!("Could not revoke the session on the backend: {error}");
            }
        }

        if let Err(error) = lock(&self.storage).and_then(|mut storage| storage.clear_cached()) {
            tracing::error!("Could not clear local storage: {error}");
        }

        AuthResult::succeeded()
    }

    /// The cached snapshot of the signed-in user.
    pub fn current_user(&self) -> Option<SessionUser> {
        lock(&self.storage)
            .and_then(|storage| storage.get(StorageKey::UserData))
            .unwrap_or_else(|error| {
                tracing::warn!("Could not read the cached user: {error}");
                None
            })
    }

    /// The access token of the cached session.
    pub fn access_token(&self) -> Option<String> {
        lock(&self.storage)
            .and_then(|storage| storage.get(StorageKey::Token))
            .unwrap_or_else(|error| {
                tracing::warn!("Could not read the cached token: {error}");
                None
            })
    }

    /// Whether a session is cached and its access token has not expired.
    ///
    /// Sessions from the mock store never expire.
    pub fn is_logged_in(&self) -> bool {
        match self.check_logged_in() {
            Ok(is_logged_in) => is_logged_in,
            Err(error) => {
                tracing::warn!("Could not read the cached session: {error}");
                false
            }
        }
    }

    fn check_logged_in(&self) -> Result<bool, Error> {
        let storage = lock(&self.storage)?;

        let has_token = storage.get::<String>(StorageKey::Token)?.is_some();
        let has_user = storage.get::<SessionUser>(StorageKey::UserData)?.is_some();
        if !has_token || !has_user {
            return Ok(false);
        }

        if storage.get_or_default::<bool>(StorageKey::DemoSession)? {
            return Ok(true);
        }

        let expires_at: Option<OffsetDateTime> = storage
            .get::<String>(StorageKey::TokenExpiresAt)?
            .map(|raw| parse_timestamp(&raw))
            .transpose()?;

        Ok(expires_at.is_none_or(|expires_at| expires_at > OffsetDateTime::now_utc()))
    }

    /// Exchange the cached refresh token for a new token pair.
    ///
    /// If the backend rejects the refresh token the cached session is cleared.
    pub async fn refresh_session(&self) -> AuthResult {
        let cached = lock(&self.storage).and_then(|storage| {
            Ok((
                storage.get::<String>(StorageKey::RefreshToken)?,
                storage.get_or_default::<bool>(StorageKey::DemoSession)?,
            ))
        });

        let refresh_token = match cached {
            Ok((_, true)) => return self.cached_result(),
            Ok((Some(refresh_token), false)) => refresh_token,
            Ok((None, false)) => return AuthResult::from_error(&Error::NotLoggedIn),
            Err(error) => return AuthResult::from_error(&error),
        };

        let session = match self.backend.refresh(&refresh_token).await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!("Could not refresh the session: {error}");
                self.clear_session();
                return AuthResult::from_error(&error);
            }
        };

        if let Err(error) = self.handle_auth_event(AuthEvent::TokenRefreshed(session)) {
            return AuthResult::from_error(&error);
        }

        self.cached_result()
    }

    /// Ask the backend to send the email confirmation again.
    pub async fn resend_confirmation(&self, email: &str) -> AuthResult {
        let email = match normalize_email(email) {
            Ok(email) => email,
            Err(error) => return AuthResult::from_error(&error),
        };

        if self.options.offline || is_demo_email(&email) {
            return AuthResult::failed("Accounts on this device do not need to be confirmed.");
        }

        match self.backend.resend_confirmation(&email).await {
            Ok(()) => AuthResult::succeeded(),
            Err(error) => AuthResult::from_error(&error),
        }
    }

    /// Update the cache in response to a session change.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage cannot be read or written.
    pub fn handle_auth_event(&self, event: AuthEvent) -> Result<(), Error> {
        match event {
            AuthEvent::SignedIn(session) => {
                let mut storage = lock(&self.storage)?;
                let cached_user: Option<SessionUser> = storage.get(StorageKey::UserData)?;

                // Another user's cached data must not leak into this session.
                if cached_user.is_none_or(|user| user.id != session.user.id) {
                    let profile = Profile::from_auth_user(&session.user);
                    storage.clear_cached()?;
                    storage.set(StorageKey::UserData, &SessionUser::from(&profile))?;
                }

                storage.set(StorageKey::DemoSession, &false)?;
                store_tokens(&mut storage, &session)
            }
            AuthEvent::TokenRefreshed(session) => {
                let mut storage = lock(&self.storage)?;
                store_tokens(&mut storage, &session)
            }
            AuthEvent::UserUpdated(profile) => {
                let mut storage = lock(&self.storage)?;
                storage.set(StorageKey::UserProfile, &profile)?;
                storage.set(StorageKey::UserData, &SessionUser::from(&profile))
            }
            AuthEvent::SignedOut => lock(&self.storage)?.clear_cached(),
        }
    }

    /// Update the signed-in user's profile.
    ///
    /// For mock store sessions the cached profile is updated directly.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotLoggedIn] if there is no session, or the backend or storage error.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, Error> {
        let (token, is_local) = self.cached_session_kind()?.ok_or(Error::NotLoggedIn)?;

        let profile = if is_local {
            let mut profile = self.cached_profile()?.ok_or(Error::NotLoggedIn)?;
            update.apply(&mut profile)?;
            profile
        } else {
            self.backend.update_profile(&token, update).await?
        };

        self.handle_auth_event(AuthEvent::UserUpdated(profile.clone()))?;

        Ok(profile)
    }

    /// The cached profile of the signed-in user.
    pub fn cached_profile(&self) -> Result<Option<Profile>, Error> {
        lock(&self.storage)?.get(StorageKey::UserProfile)
    }

    /// The budgeting helpers for the device.
    pub fn planner(&self) -> Planner<S> {
        Planner::new(self.storage.clone())
    }

    /// Sign in to the backend's account and cache the session.
    async fn start_session(&self, session: AuthSession) -> AuthResult {
        let profile = self.ensure_profile(&session).await;
        let user = SessionUser::from(&profile);

        let cached = lock(&self.storage).and_then(|mut storage| {
            storage.clear_cached()?;
            store_tokens(&mut storage, &session)?;
            storage.set(StorageKey::UserData, &user)?;
            storage.set(StorageKey::UserProfile, &profile)?;
            storage.set(StorageKey::DemoSession, &false)
        });

        match cached {
            Ok(()) => AuthResult::signed_in(user, session.access_token),
            Err(error) => {
                tracing::error!("Could not cache the session: {error}");
                AuthResult::from_error(&error)
            }
        }
    }

    /// Fetch the user's profile, creating it if it does not exist yet.
    ///
    /// A missing profile is expected for new users. Other failures are logged and retried with a
    /// linearly growing delay. If every attempt fails, a profile is derived from the auth user so
    /// that signing in still succeeds.
    async fn ensure_profile(&self, session: &AuthSession) -> Profile {
        let token = &session.access_token;
        let retry = self.options.retry;

        for attempt in 1..=retry.max_attempts {
            match self.backend.get_profile(token).await {
                Ok(Some(profile)) => return profile,
                Ok(None) => {
                    tracing::debug!("No profile for user {}, creating one", session.user.id)
                }
                Err(error) => tracing::warn!(
                    "Could not fetch profile (attempt {attempt}/{}): {error}",
                    retry.max_attempts
                ),
            }

            match self
                .backend
                .create_profile(token, &NewProfile::for_user(&session.user))
                .await
            {
                Ok(profile) => return profile,
                Err(Error::DuplicateProfile) => {
                    tracing::debug!("Profile was created concurrently, fetching it again")
                }
                Err(error) => tracing::warn!(
                    "Could not create profile (attempt {attempt}/{}): {error}",
                    retry.max_attempts
                ),
            }

            if attempt < retry.max_attempts {
                tokio::time::sleep(retry.delay_for(attempt)).await;
            }
        }

        tracing::warn!(
            "Giving up on the profile for user {}, using the auth details instead",
            session.user.id
        );

        Profile::from_auth_user(&session.user)
    }

    fn mock_store_register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<MockSession, Error> {
        self.mock_store
            .lock()
            .map_err(|_| Error::StorageLockError)?
            .register(name, email, password)
    }

    fn mock_store_login(&self, email: &str, password: &str) -> Result<MockSession, Error> {
        self.mock_store
            .lock()
            .map_err(|_| Error::StorageLockError)?
            .login(email, password)
    }

    /// Cache a mock store session and seed its local data.
    fn start_local_session(&self, session: MockSession) -> AuthResult {
        let cached = lock(&self.storage).and_then(|mut storage| {
            storage.clear_cached()?;
            storage.set(StorageKey::Token, &session.token)?;
            storage.set(StorageKey::UserData, &session.user)?;
            storage.set(StorageKey::UserProfile, &session.profile)?;
            storage.set(StorageKey::DemoSession, &true)
        });

        let seeded = cached.and_then(|()| {
            LocalLedger::new(self.storage.clone(), session.user.id).seed_default_categories()
        });

        match seeded {
            Ok(()) => AuthResult::signed_in(session.user, session.token),
            Err(error) => {
                tracing::error!("Could not cache the session: {error}");
                AuthResult::from_error(&error)
            }
        }
    }

    /// The cached access token and whether it came from the mock store.
    fn cached_session_kind(&self) -> Result<Option<(String, bool)>, Error> {
        let storage = lock(&self.storage)?;
        let token: Option<String> = storage.get(StorageKey::Token)?;
        let is_local = storage.get_or_default(StorageKey::DemoSession)?;

        Ok(token.map(|token| (token, is_local)))
    }

    fn cached_result(&self) -> AuthResult {
        match (self.current_user(), self.access_token()) {
            (Some(user), Some(token)) => AuthResult::signed_in(user, token),
            _ => AuthResult::from_error(&Error::NotLoggedIn),
        }
    }

    fn clear_session(&self) {
        if let Err(error) = self.handle_auth_event(AuthEvent::SignedOut) {
            tracing::error!("Could not clear local storage: {error}");
        }
    }
}

impl<B: AuthBackend + DataBackend, S: KeyValueStore + 'static> SessionManager<B, S> {
    /// The ledger of the signed-in user.
    ///
    /// Mock store sessions keep their data in local storage, other sessions use the backend.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotLoggedIn] if there is no session.
    pub fn ledger(&self) -> Result<Box<dyn Ledger>, Error> {
        let (token, is_local) = self.cached_session_kind()?.ok_or(Error::NotLoggedIn)?;

        if is_local {
            let user = self.current_user().ok_or(Error::NotLoggedIn)?;
            Ok(Box::new(LocalLedger::new(self.storage.clone(), user.id)))
        } else {
            Ok(self.backend.ledger(&token))
        }
    }
}

fn store_tokens<S: KeyValueStore>(
    storage: &mut LocalStorage<S>,
    session: &AuthSession,
) -> Result<(), Error> {
    storage.set(StorageKey::Token, &session.access_token)?;
    storage.set(StorageKey::RefreshToken, &session.refresh_token)?;
    storage.set(StorageKey::TokenExpiresAt, &format_timestamp(session.expires_at)?)
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, Error> {
    timestamp
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339).map_err(|error| {
        Error::CorruptStorage {
            key: StorageKey::TokenExpiresAt.as_str().to_owned(),
            message: error.to_string(),
        }
    })
}

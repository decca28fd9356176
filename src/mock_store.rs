//! An in-process stand-in for the hosted service, used for the demo account and offline use.
//!
//! The store is seeded with a single demo user. Registering and logging in work the same way
//! as against the hosted service, but nothing leaves the process and the issued tokens are not
//! cryptographically meaningful.

use std::collections::HashMap;

use time::{Date, OffsetDateTime, macros::date};

use crate::{
    Error, Profile, SessionUser, UserID, ValidatedPassword,
    user::normalize_email,
};

/// The email address of the demo account.
pub const DEMO_EMAIL: &str = "demo@budgettracker.com";
/// The password of the demo account.
pub const DEMO_PASSWORD: &str = "demo1234";
/// The ID of the demo account.
pub const DEMO_USER_ID: UserID = UserID::new(0);
/// The display name of the demo account.
pub const DEMO_NAME: &str = "Demo User";
/// The date of birth on the demo account's profile.
pub const DEMO_DATE_OF_BIRTH: Date = date!(1990 - 01 - 01);
/// The identity number on the demo account's profile.
pub const DEMO_IDENTITY_NUMBER: &str = "DEMO-0000";

/// Whether `email` and `password` are the demo account's credentials.
///
/// The email is compared after normalization, so surrounding whitespace and case are ignored.
pub fn is_demo_credentials(email: &str, password: &str) -> bool {
    is_demo_email(email) && password == DEMO_PASSWORD
}

/// Whether `email` is the demo account's email address.
pub fn is_demo_email(email: &str) -> bool {
    email.trim().eq_ignore_ascii_case(DEMO_EMAIL)
}

/// A session issued by the [MockStore].
#[derive(Debug, Clone, PartialEq)]
pub struct MockSession {
    /// The signed-in user.
    pub user: SessionUser,
    /// The user's profile, the source of `user`.
    pub profile: Profile,
    /// An opaque token of the form `mock-token-<id>-<millis>`.
    pub token: String,
}

#[derive(Debug, Clone)]
struct MockUser {
    profile: Profile,
    // Kept in plain text, the store only lives in memory.
    password: String,
}

/// Emulates registration and login with an in-memory map of users keyed by email.
#[derive(Debug)]
pub struct MockStore {
    users: HashMap<String, MockUser>,
    last_id: i64,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    /// Create a store containing only the demo user.
    pub fn new() -> Self {
        let demo_user = MockUser {
            profile: Profile {
                id: DEMO_USER_ID,
                email: DEMO_EMAIL.to_owned(),
                display_name: DEMO_NAME.to_owned(),
                profile_complete: true,
                date_of_birth: Some(DEMO_DATE_OF_BIRTH),
                identity_number: Some(DEMO_IDENTITY_NUMBER.to_owned()),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            password: DEMO_PASSWORD.to_owned(),
        };

        Self {
            users: HashMap::from([(DEMO_EMAIL.to_owned(), demo_user)]),
            last_id: DEMO_USER_ID.as_i64(),
        }
    }

    /// Register a new user and sign them in.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingField] if `name` is blank, an email validation error if `email` is
    /// not a valid address, a password validation error if `password` is too short, and
    /// [Error::EmailAlreadyRegistered] if the email is already in use.
    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<MockSession, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::MissingField("name".to_owned()));
        }

        let email = normalize_email(email)?;
        ValidatedPassword::new(password)?;

        if self.users.contains_key(&email) {
            return Err(Error::EmailAlreadyRegistered);
        }

        let profile = Profile {
            id: self.next_id(),
            email: email.clone(),
            display_name: name.to_owned(),
            profile_complete: false,
            date_of_birth: None,
            identity_number: None,
            created_at: OffsetDateTime::now_utc(),
        };

        self.users.insert(
            email,
            MockUser {
                profile: profile.clone(),
                password: password.to_owned(),
            },
        );

        Ok(issue_session(profile))
    }

    /// Sign in an existing user.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidCredentials] if there is no user with the email or the password
    /// does not match.
    pub fn login(&self, email: &str, password: &str) -> Result<MockSession, Error> {
        let email = email.trim().to_lowercase();

        match self.users.get(&email) {
            Some(stored) if stored.password == password => Ok(issue_session(stored.profile.clone())),
            _ => Err(Error::InvalidCredentials),
        }
    }

    /// The number of registered users, including the demo user.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// IDs are derived from the current time and kept strictly increasing.
    fn next_id(&mut self) -> UserID {
        self.last_id = now_millis().max(self.last_id + 1);
        UserID::new(self.last_id)
    }
}

fn issue_session(profile: Profile) -> MockSession {
    let token = format!("mock-token-{}-{}", profile.id, now_millis());

    MockSession {
        user: SessionUser::from(&profile),
        profile,
        token,
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

//! Users, their profiles and the cached snapshot of the signed-in user.

use std::fmt::Display;

use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::Error;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Trim and lowercase `raw_email` and check that it is a valid email address.
///
/// # Errors
///
/// Returns [Error::MissingField] if the string is empty and [Error::InvalidEmail] if it
/// cannot be parsed as an email address.
pub fn normalize_email(raw_email: &str) -> Result<String, Error> {
    let email = raw_email.trim().to_lowercase();

    if email.is_empty() {
        return Err(Error::MissingField("email".to_owned()));
    }

    if !EmailAddress::is_valid(&email) {
        return Err(Error::InvalidEmail(email));
    }

    Ok(email)
}

/// The identity record held by the hosted service for a registered account.
///
/// This is distinct from the [Profile], which holds the application-level
/// details about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The user's ID.
    pub id: UserID,
    /// The normalized email address the user signs in with.
    pub email: String,
    /// The name given at registration.
    pub name: String,
    /// Whether the user has confirmed their email address.
    pub email_confirmed: bool,
}

/// The application-level record for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// The ID of the user that owns this profile.
    pub id: UserID,
    /// The user's email address.
    pub email: String,
    /// The name shown in the app.
    pub display_name: String,
    /// Set once the optional identity details have been filled in.
    pub profile_complete: bool,
    /// The user's date of birth.
    pub date_of_birth: Option<Date>,
    /// A government or bank identity number.
    pub identity_number: Option<String>,
    /// When the profile was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Profile {
    /// Build a profile from the auth identity without touching the backend.
    ///
    /// Used when the profile could not be fetched or created, so that signing in still works.
    pub fn from_auth_user(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: display_name_or_email(&user.name, &user.email),
            profile_complete: false,
            date_of_birth: None,
            identity_number: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// The details needed to create a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    /// The user's email address.
    pub email: String,
    /// The name shown in the app.
    pub display_name: String,
}

impl NewProfile {
    /// The profile details for a freshly authenticated user.
    pub fn for_user(user: &AuthUser) -> Self {
        Self {
            email: user.email.clone(),
            display_name: display_name_or_email(&user.name, &user.email),
        }
    }
}

/// A partial update of a profile, `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// The new display name.
    pub display_name: Option<String>,
    /// The new date of birth.
    pub date_of_birth: Option<Date>,
    /// The new identity number.
    pub identity_number: Option<String>,
}

impl ProfileUpdate {
    /// Apply the update to `profile`, recomputing the completion flag.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingField] if the new display name is blank.
    pub fn apply(&self, profile: &mut Profile) -> Result<(), Error> {
        if let Some(display_name) = &self.display_name {
            let display_name = display_name.trim();

            if display_name.is_empty() {
                return Err(Error::MissingField("display name".to_owned()));
            }

            profile.display_name = display_name.to_owned();
        }

        if let Some(date_of_birth) = self.date_of_birth {
            profile.date_of_birth = Some(date_of_birth);
        }

        if let Some(identity_number) = &self.identity_number {
            let identity_number = identity_number.trim();
            profile.identity_number =
                (!identity_number.is_empty()).then(|| identity_number.to_owned());
        }

        profile.profile_complete =
            profile.date_of_birth.is_some() && profile.identity_number.is_some();

        Ok(())
    }
}

/// The snapshot of the signed-in user that is cached on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// The user's ID.
    pub id: UserID,
    /// The user's email address.
    pub email: String,
    /// The name shown in the app.
    pub name: String,
    /// Whether the user has completed their profile.
    pub profile_complete: bool,
}

impl From<&Profile> for SessionUser {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
            name: profile.display_name.clone(),
            profile_complete: profile.profile_complete,
        }
    }
}

fn display_name_or_email(name: &str, email: &str) -> String {
    let name = name.trim();

    if name.is_empty() {
        email.split('@').next().unwrap_or(email).to_owned()
    } else {
        name.to_owned()
    }
}

//! Database operations for the accounts users sign in with.

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{Error, PasswordHash, UserID, user::AuthUser};

/// Create an account.
///
/// `confirmation_token_hash` is the digest of the token the user must present to confirm their
/// email address, `None` if the account does not need confirming.
///
/// # Errors
///
/// Returns [Error::EmailAlreadyRegistered] if the email address is already in use.
pub fn create_auth_user(
    name: &str,
    email: &str,
    password_hash: &PasswordHash,
    confirmation_token_hash: Option<&str>,
    connection: &Connection,
) -> Result<AuthUser, Error> {
    let email_confirmed = confirmation_token_hash.is_none();

    connection.execute(
        "INSERT INTO auth_user (email, password_hash, name, email_confirmed, confirmation_token_hash, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        (
            email,
            password_hash.as_ref(),
            name,
            email_confirmed,
            confirmation_token_hash,
            OffsetDateTime::now_utc(),
        ),
    )?;

    Ok(AuthUser {
        id: UserID::new(connection.last_insert_rowid()),
        email: email.to_owned(),
        name: name.to_owned(),
        email_confirmed,
    })
}

/// Get an account by ID.
pub fn get_auth_user(id: UserID, connection: &Connection) -> Result<AuthUser, Error> {
    connection
        .prepare("SELECT id, email, name, email_confirmed FROM auth_user WHERE id = :id;")?
        .query_row(&[(":id", &id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get an account and its password hash by email address.
///
/// # Errors
///
/// Returns [Error::NotFound] if no account uses the email address.
pub fn get_auth_user_by_email(
    email: &str,
    connection: &Connection,
) -> Result<(AuthUser, PasswordHash), Error> {
    connection
        .prepare(
            "SELECT id, email, name, email_confirmed, password_hash FROM auth_user WHERE email = :email;",
        )?
        .query_row(&[(":email", &email)], |row| {
            let user = map_row(row)?;
            let raw_password_hash: String = row.get(4)?;

            Ok((user, PasswordHash::new_unchecked(&raw_password_hash)))
        })
        .map_err(|error| error.into())
}

/// Replace the confirmation token of an unconfirmed account.
///
/// Returns `false` if there is no unconfirmed account with the email address.
pub fn replace_confirmation_token(
    email: &str,
    confirmation_token_hash: &str,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "UPDATE auth_user SET confirmation_token_hash = ?1 WHERE email = ?2 AND email_confirmed = 0;",
        (confirmation_token_hash, email),
    )?;

    Ok(rows_affected > 0)
}

/// Confirm the email address of the account with the confirmation token.
///
/// # Errors
///
/// Returns [Error::InvalidConfirmationToken] if no account has the token.
pub fn confirm_email(confirmation_token_hash: &str, connection: &Connection) -> Result<AuthUser, Error> {
    let id: Option<i64> = connection
        .query_row(
            "SELECT id FROM auth_user WHERE confirmation_token_hash = ?1;",
            [confirmation_token_hash],
            |row| row.get(0),
        )
        .optional()?;

    let id = UserID::new(id.ok_or(Error::InvalidConfirmationToken)?);

    connection.execute(
        "UPDATE auth_user SET email_confirmed = 1, confirmation_token_hash = NULL WHERE id = ?1;",
        [id.as_i64()],
    )?;

    get_auth_user(id, connection)
}

/// Create the auth user table.
pub fn create_auth_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS auth_user (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            email_confirmed INTEGER NOT NULL DEFAULT 0,
            confirmation_token_hash TEXT UNIQUE,
            created_at TEXT NOT NULL
        );",
    )
}

fn map_row(row: &Row) -> Result<AuthUser, rusqlite::Error> {
    Ok(AuthUser {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        email_confirmed: row.get(3)?,
    })
}

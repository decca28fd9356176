//! Opaque session tokens.
//!
//! Tokens are random UUIDs handed to the client once. The database only stores their SHA-256
//! digests, so a leaked database does not leak usable tokens.

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, UserID, api::AuthSession, service::auth_user::get_auth_user, user::AuthUser};

/// How long a refresh token can be exchanged for a new session.
pub const REFRESH_TOKEN_DURATION: Duration = Duration::days(30);

/// Generate a new random token.
pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The hex encoded SHA-256 digest of `token`.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Start a session for `user` with an access token that is valid for `duration`.
///
/// Sessions whose refresh token has expired are purged first.
pub fn create_session(
    user: AuthUser,
    duration: Duration,
    connection: &Connection,
) -> Result<AuthSession, Error> {
    let access_token = new_token();
    let refresh_token = new_token();
    let now = OffsetDateTime::now_utc();
    let expires_at = now + duration;

    purge_expired_sessions(now, connection)?;

    connection.execute(
        "INSERT INTO session (user_id, access_token_hash, refresh_token_hash, expires_at, refresh_expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5);",
        (
            user.id.as_i64(),
            hash_token(&access_token),
            hash_token(&refresh_token),
            expires_at,
            now + REFRESH_TOKEN_DURATION,
        ),
    )?;

    Ok(AuthSession {
        access_token,
        refresh_token,
        expires_at,
        user,
    })
}

/// Get the user an access token belongs to.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token is unknown, revoked or expired.
pub fn get_session_user(access_token: &str, connection: &Connection) -> Result<UserID, Error> {
    let session: Option<(i64, OffsetDateTime)> = connection
        .query_row(
            "SELECT user_id, expires_at FROM session WHERE access_token_hash = ?1;",
            [hash_token(access_token)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match session {
        Some((user_id, expires_at)) if expires_at > OffsetDateTime::now_utc() => {
            Ok(UserID::new(user_id))
        }
        _ => Err(Error::InvalidToken),
    }
}

/// Exchange a refresh token for a new session, revoking the old one.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the refresh token is unknown, already used or expired.
pub fn refresh_session(
    refresh_token: &str,
    duration: Duration,
    connection: &Connection,
) -> Result<AuthSession, Error> {
    let transaction = connection.unchecked_transaction()?;

    let session: Option<(i64, i64, OffsetDateTime)> = transaction
        .query_row(
            "SELECT id, user_id, refresh_expires_at FROM session WHERE refresh_token_hash = ?1;",
            [hash_token(refresh_token)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (session_id, user_id) = match session {
        Some((session_id, user_id, refresh_expires_at))
            if refresh_expires_at > OffsetDateTime::now_utc() =>
        {
            (session_id, UserID::new(user_id))
        }
        _ => return Err(Error::InvalidToken),
    };

    transaction.execute("DELETE FROM session WHERE id = ?1;", [session_id])?;
    let user = get_auth_user(user_id, &transaction)?;
    let session = create_session(user, duration, &transaction)?;

    transaction.commit()?;

    Ok(session)
}

/// Delete every session that can no longer be refreshed at `now`.
fn purge_expired_sessions(now: OffsetDateTime, connection: &Connection) -> Result<(), Error> {
    let purged = connection.execute(
        "DELETE FROM session WHERE refresh_expires_at <= ?1;",
        [now],
    )?;

    if purged > 0 {
        tracing::debug!("Purged {purged} expired sessions");
    }

    Ok(())
}

/// Revoke the session an access token belongs to. Revoking an unknown token does nothing.
pub fn revoke_session(access_token: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM session WHERE access_token_hash = ?1;",
        [hash_token(access_token)],
    )?;

    Ok(())
}

/// Create the session table.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS session (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
            access_token_hash TEXT NOT NULL UNIQUE,
            refresh_token_hash TEXT NOT NULL UNIQUE,
            expires_at TEXT NOT NULL,
            refresh_expires_at TEXT NOT NULL
        );",
    )
}

#[cfg(test)]
mod session_token_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error, PasswordHash,
        service::{
            auth_user::create_auth_user,
            initialize,
            session_token::{
                create_session, get_session_user, hash_token, refresh_session, revoke_session,
            },
        },
        user::AuthUser,
    };

    fn get_test_db_connection() -> (Connection, AuthUser) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        let user = create_auth_user(
            "Jane",
            "jane@example.com",
            &PasswordHash::new_unchecked("hash"),
            None,
            &connection,
        )
        .unwrap();

        (connection, user)
    }

    #[test]
    fn hash_token_is_hex_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn access_token_resolves_to_user() {
        let (connection, user) = get_test_db_connection();
        let session = create_session(user.clone(), Duration::minutes(5), &connection).unwrap();

        let user_id = get_session_user(&session.access_token, &connection);

        assert_eq!(user_id, Ok(user.id));
    }

    #[test]
    fn expired_access_token_is_invalid() {
        let (connection, user) = get_test_db_connection();
        let session = create_session(user, Duration::seconds(-1), &connection).unwrap();

        let user_id = get_session_user(&session.access_token, &connection);

        assert_eq!(user_id, Err(Error::InvalidToken));
    }

    #[test]
    fn tokens_are_stored_as_digests() {
        let (connection, user) = get_test_db_connection();
        let session = create_session(user, Duration::minutes(5), &connection).unwrap();

        let stored: String = connection
            .query_row("SELECT access_token_hash FROM session;", [], |row| row.get(0))
            .unwrap();

        assert_ne!(stored, session.access_token);
        assert_eq!(stored, hash_token(&session.access_token));
    }

    #[test]
    fn refresh_rotates_tokens() {
        let (connection, user) = get_test_db_connection();
        let session = create_session(user.clone(), Duration::minutes(5), &connection).unwrap();

        let refreshed = refresh_session(&session.refresh_token, Duration::minutes(5), &connection)
            .unwrap();

        assert_eq!(refreshed.user, user);
        assert_eq!(
            get_session_user(&session.access_token, &connection),
            Err(Error::InvalidToken)
        );
        assert_eq!(
            get_session_user(&refreshed.access_token, &connection),
            Ok(user.id)
        );
        assert_eq!(
            refresh_session(&session.refresh_token, Duration::minutes(5), &connection),
            Err(Error::InvalidToken)
        );
    }

    #[test]
    fn revoked_token_is_invalid() {
        let (connection, user) = get_test_db_connection();
        let session = create_session(user, Duration::minutes(5), &connection).unwrap();

        revoke_session(&session.access_token, &connection).unwrap();

        assert_eq!(
            get_session_user(&session.access_token, &connection),
            Err(Error::InvalidToken)
        );
    }

    #[test]
    fn creating_a_session_purges_expired_ones() {
        let (connection, user) = get_test_db_connection();
        let abandoned = create_session(user.clone(), Duration::minutes(5), &connection).unwrap();
        let active = create_session(user.clone(), Duration::minutes(5), &connection).unwrap();
        connection
            .execute(
                "UPDATE session SET refresh_expires_at = ?1 WHERE refresh_token_hash = ?2;",
                (
                    OffsetDateTime::now_utc() - Duration::days(1),
                    hash_token(&abandoned.refresh_token),
                ),
            )
            .unwrap();

        let latest = create_session(user.clone(), Duration::minutes(5), &connection).unwrap();

        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM session;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            get_session_user(&abandoned.access_token, &connection),
            Err(Error::InvalidToken)
        );
        assert_eq!(get_session_user(&active.access_token, &connection), Ok(user.id));
        assert_eq!(get_session_user(&latest.access_token, &connection), Ok(user.id));
    }
}

//! Database operations for user profiles.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error, Profile, UserID,
    service::category::insert_default_categories,
    user::{NewProfile, ProfileUpdate},
};

/// Create the profile for `user_id` and give the user the default categories.
///
/// # Errors
///
/// Returns [Error::DuplicateProfile] if the user already has a profile, or
/// [Error::MissingField] if the display name is blank.
pub fn create_profile(
    user_id: UserID,
    new_profile: &NewProfile,
    connection: &Connection,
) -> Result<Profile, Error> {
    let display_name = new_profile.display_name.trim();

    if display_name.is_empty() {
        return Err(Error::MissingField("display name".to_owned()));
    }

    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "INSERT INTO profile (user_id, email, display_name, profile_complete, created_at)
        VALUES (?1, ?2, ?3, 0, ?4);",
        (
            user_id.as_i64(),
            &new_profile.email,
            display_name,
            OffsetDateTime::now_utc(),
        ),
    )?;

    insert_default_categories(user_id, &transaction)?;

    let profile = get_profile(user_id, &transaction)?;

    transaction.commit()?;

    Ok(profile)
}

/// Retrieve the profile of `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has not created a profile yet.
pub fn get_profile(user_id: UserID, connection: &Connection) -> Result<Profile, Error> {
    connection
        .prepare(
            "SELECT user_id, email, display_name, profile_complete, date_of_birth, identity_number, created_at
            FROM profile WHERE user_id = :user_id;",
        )?
        .query_row(&[(":user_id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Apply `update` to the profile of `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has no profile, or [Error::MissingField] if the update
/// sets a blank display name.
pub fn update_profile(
    user_id: UserID,
    update: &ProfileUpdate,
    connection: &Connection,
) -> Result<Profile, Error> {
    let mut profile = get_profile(user_id, connection)?;
    update.apply(&mut profile)?;

    connection.execute(
        "UPDATE profile SET display_name = ?1, profile_complete = ?2, date_of_birth = ?3, identity_number = ?4
        WHERE user_id = ?5;",
        (
            &profile.display_name,
            profile.profile_complete,
            profile.date_of_birth,
            &profile.identity_number,
            user_id.as_i64(),
        ),
    )?;

    Ok(profile)
}

/// Initialize the profile table.
pub fn create_profile_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS profile (
            user_id INTEGER PRIMARY KEY REFERENCES auth_user(id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            display_name TEXT NOT NULL,
            profile_complete INTEGER NOT NULL DEFAULT 0,
            date_of_birth TEXT,
            identity_number TEXT,
            created_at TEXT NOT NULL
        );",
    )
}

fn map_row(row: &Row) -> Result<Profile, rusqlite::Error> {
    Ok(Profile {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        display_name: row.get(2)?,
        profile_complete: row.get(3)?,
        date_of_birth: row.get(4)?,
        identity_number: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod profile_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error, PasswordHash, UserID,
        category::default_categories,
        service::{
            auth_user::create_auth_user,
            category::get_categories,
            initialize,
            profile::{create_profile, get_profile, update_profile},
        },
        user::{NewProfile, ProfileUpdate},
    };

    fn get_test_db_connection() -> (Connection, UserID) {
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

        (connection, user.id)
    }

    fn new_profile() -> NewProfile {
        NewProfile {
            email: "jane@example.com".to_owned(),
            display_name: "Jane".to_owned(),
        }
    }

    #[test]
    fn create_profile_seeds_default_categories() {
        let (connection, user_id) = get_test_db_connection();

        let profile = create_profile(user_id, &new_profile(), &connection).unwrap();

        assert_eq!(profile.id, user_id);
        assert!(!profile.profile_complete);
        assert_eq!(
            get_categories(user_id, &connection).unwrap().len(),
            default_categories().len()
        );
    }

    #[test]
    fn create_profile_twice_fails() {
        let (connection, user_id) = get_test_db_connection();
        create_profile(user_id, &new_profile(), &connection).unwrap();

        let result = create_profile(user_id, &new_profile(), &connection);

        assert_eq!(result, Err(Error::DuplicateProfile));
        assert_eq!(
            get_categories(user_id, &connection).unwrap().len(),
            default_categories().len()
        );
    }

    #[test]
    fn get_missing_profile_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();

        assert_eq!(get_profile(user_id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn update_profile_persists_and_completes() {
        let (connection, user_id) = get_test_db_connection();
        create_profile(user_id, &new_profile(), &connection).unwrap();

        let updated = update_profile(
            user_id,
            &ProfileUpdate {
                display_name: Some("Jane Doe".to_owned()),
                date_of_birth: Some(date!(1990 - 04 - 01)),
                identity_number: Some("AB123456".to_owned()),
            },
            &connection,
        )
        .unwrap();

        assert!(updated.profile_complete);
        assert_eq!(get_profile(user_id, &connection), Ok(updated));
    }
}

//! Database operations for categories.
//!
//! Every query is scoped to the owning user. A category that belongs to someone else behaves
//! exactly like one that does not exist.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Category, CategoryData, CategoryId, CategoryName, Error, UserID, category::default_categories,
};

/// Create a category for `user_id`.
///
/// # Errors
///
/// Returns [Error::DuplicateCategory] if the user already has a category with the same name
/// (ignoring case) and transaction type, or [Error::InvalidBudget] if the budget is negative.
pub fn create_category(
    user_id: UserID,
    data: CategoryData,
    connection: &Connection,
) -> Result<Category, Error> {
    data.validate()?;

    connection
        .execute(
            "INSERT INTO category (user_id, name, kind, color, icon, budget) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            (
                user_id.as_i64(),
                data.name.as_ref(),
                data.kind,
                &data.color,
                &data.icon,
                data.budget,
            ),
        )
        .map_err(|error| name_duplicate(error.into(), &data.name))?;

    let id = connection.last_insert_rowid();

    Ok(data.into_category(id, user_id))
}

/// Insert the default categories for a new user, skipping any the user already has.
pub fn insert_default_categories(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let mut statement = connection.prepare(
        "INSERT OR IGNORE INTO category (user_id, name, kind, color, icon, budget) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
    )?;

    for data in default_categories() {
        statement.execute((
            user_id.as_i64(),
            data.name.as_ref(),
            data.kind,
            &data.color,
            &data.icon,
            data.budget,
        ))?;
    }

    Ok(())
}

/// Retrieve one of the user's categories.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has no category with the ID.
pub fn get_category(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind, color, icon, budget FROM category
            WHERE id = :id AND user_id = :user_id;",
        )?
        .query_row(
            &[(":id", &category_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Like [get_category], but a missing category is `None` instead of an error.
pub fn find_category(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Option<Category>, Error> {
    get_category(user_id, category_id, connection)
        .map(Some)
        .or_else(|error| match error {
            Error::NotFound => Ok(None),
            error => Err(error),
        })
}

/// Retrieve the user's categories, income first and then alphabetically.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind, color, icon, budget FROM category
            WHERE user_id = :user_id
            ORDER BY kind DESC, name ASC;",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Replace the fields of one of the user's categories.
///
/// Changing the transaction type detaches the transactions of the old type from the category.
///
/// # Errors
///
/// Returns [Error::UpdateMissingCategory] if the user has no category with the ID, or
/// [Error::DuplicateCategory] if the new name clashes with another category of the same type.
pub fn update_category(
    user_id: UserID,
    category_id: CategoryId,
    data: CategoryData,
    connection: &Connection,
) -> Result<Category, Error> {
    data.validate()?;

    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction
        .execute(
            "UPDATE category SET name = ?1, kind = ?2, color = ?3, icon = ?4, budget = ?5
            WHERE id = ?6 AND user_id = ?7;",
            (
                data.name.as_ref(),
                data.kind,
                &data.color,
                &data.icon,
                data.budget,
                category_id,
                user_id.as_i64(),
            ),
        )
        .map_err(|error| name_duplicate(error.into(), &data.name))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    transaction.execute(
        "UPDATE \"transaction\" SET category_id = NULL
        WHERE category_id = ?1 AND user_id = ?2 AND kind != ?3;",
        (category_id, user_id.as_i64(), data.kind),
    )?;

    transaction.commit()?;

    Ok(data.into_category(category_id, user_id))
}

/// Delete one of the user's categories. Its transactions are kept but become uncategorized.
///
/// # Errors
///
/// Returns [Error::DeleteMissingCategory] if the user has no category with the ID.
pub fn delete_category(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "UPDATE \"transaction\" SET category_id = NULL WHERE category_id = ?1 AND user_id = ?2;",
        (category_id, user_id.as_i64()),
    )?;

    let rows_affected = transaction.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2;",
        (category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    transaction.commit()?;

    Ok(())
}

/// Initialize the category table.
///
/// Names are compared without case, so "food" and "Food" clash.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
            name TEXT NOT NULL COLLATE NOCASE,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            color TEXT NOT NULL,
            icon TEXT NOT NULL,
            budget REAL CHECK (budget IS NULL OR budget >= 0),
            UNIQUE (user_id, name, kind)
        );

        CREATE INDEX IF NOT EXISTS idx_category_user ON category(user_id);",
    )
}

fn name_duplicate(error: Error, name: &CategoryName) -> Error {
    match error {
        Error::DuplicateCategory(_) => Error::DuplicateCategory(name.to_string()),
        error => error,
    }
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(2)?;

    Ok(Category {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: CategoryName::new_unchecked(&raw_name),
        kind: row.get(3)?,
        color: row.get(4)?,
        icon: row.get(5)?,
        budget: row.get(6)?,
    })
}

#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use crate::{
        CategoryData, CategoryName, Error, PasswordHash, TransactionKind, UserID,
        category::default_categories,
        service::{
            auth_user::create_auth_user,
            category::{
                create_category, delete_category, find_category, get_categories, get_category,
                insert_default_categories, update_category,
            },
            initialize,
        },
    };

    fn get_test_db_connection() -> (Connection, UserID, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        let hash = PasswordHash::new_unchecked("hash");
        let jane = create_auth_user("Jane", "jane@example.com", &hash, None, &connection).unwrap();
        let john = create_auth_user("John", "john@example.com", &hash, None, &connection).unwrap();

        (connection, jane.id, john.id)
    }

    fn food() -> CategoryData {
        CategoryData::new(CategoryName::new_unchecked("Food"), TransactionKind::Expense)
    }

    #[test]
    fn create_category_succeeds() {
        let (connection, user_id, _) = get_test_db_connection();

        let category = create_category(user_id, food(), &connection).expect("Could not create category");

        assert!(category.id > 0);
        assert_eq!(get_category(user_id, category.id, &connection), Ok(category));
    }

    #[test]
    fn create_category_rejects_duplicate_name_ignoring_case() {
        let (connection, user_id, _) = get_test_db_connection();
        create_category(user_id, food(), &connection).unwrap();

        let result = create_category(
            user_id,
            CategoryData::new(CategoryName::new_unchecked("FOOD"), TransactionKind::Expense),
            &connection,
        );

        assert_eq!(result, Err(Error::DuplicateCategory("FOOD".to_owned())));
    }

    #[test]
    fn same_name_is_allowed_for_other_kind_and_other_user() {
        let (connection, jane, john) = get_test_db_connection();
        create_category(jane, food(), &connection).unwrap();

        let income = create_category(
            jane,
            CategoryData::new(CategoryName::new_unchecked("Food"), TransactionKind::Income),
            &connection,
        );
        let other_user = create_category(john, food(), &connection);

        assert!(income.is_ok());
        assert!(other_user.is_ok());
    }

    #[test]
    fn categories_of_other_users_are_not_visible() {
        let (connection, jane, john) = get_test_db_connection();
        let category = create_category(jane, food(), &connection).unwrap();

        assert_eq!(get_category(john, category.id, &connection), Err(Error::NotFound));
        assert_eq!(find_category(john, category.id, &connection), Ok(None));
        assert_eq!(get_categories(john, &connection), Ok(vec![]));
        assert_eq!(
            delete_category(john, category.id, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }

    #[test]
    fn default_categories_are_inserted_once() {
        let (connection, user_id, _) = get_test_db_connection();

        insert_default_categories(user_id, &connection).unwrap();
        insert_default_categories(user_id, &connection).unwrap();

        let categories = get_categories(user_id, &connection).unwrap();
        assert_eq!(categories.len(), default_categories().len());
        assert_eq!(categories[0].kind, TransactionKind::Income);
    }

    #[test]
    fn update_category_succeeds() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();

        let updated = update_category(
            user_id,
            category.id,
            food().budget(Some(250.0)).style("#000000", "pizza"),
            &connection,
        )
        .unwrap();

        assert_eq!(get_category(user_id, category.id, &connection), Ok(updated.clone()));
        assert_eq!(updated.budget, Some(250.0));
        assert_eq!(updated.icon, "pizza");
    }

    #[test]
    fn update_missing_category_fails() {
        let (connection, user_id, _) = get_test_db_connection();

        let result = update_category(user_id, 999, food(), &connection);

        assert_eq!(result, Err(Error::UpdateMissingCategory));
    }

    #[test]
    fn update_rejects_negative_budget() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();

        let result = update_category(user_id, category.id, food().budget(Some(-5.0)), &connection);

        assert_eq!(result, Err(Error::InvalidBudget(-5.0)));
    }

    #[test]
    fn delete_category_succeeds() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();

        delete_category(user_id, category.id, &connection).unwrap();

        assert_eq!(get_category(user_id, category.id, &connection), Err(Error::NotFound));
        assert_eq!(
            delete_category(user_id, category.id, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }
}

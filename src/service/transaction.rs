//! Database operations for transactions.

use rusqlite::{Connection, Row, params_from_iter, types::Value};
use time::OffsetDateTime;

use crate::{
    DateRange, Error, Transaction, TransactionData, TransactionId, UserID,
    service::category::find_category, transaction::ensure_category_matches,
};

/// Record a transaction for `user_id`.
///
/// # Errors
///
/// Returns [Error::InvalidAmount] if the amount is not positive, or [Error::InvalidCategory] if
/// the category is not one of the user's categories of the same transaction type.
pub fn create_transaction(
    user_id: UserID,
    data: TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate(user_id, &data, connection)?;

    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO \"transaction\" (user_id, kind, amount, category_id, description, date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        (
            user_id.as_i64(),
            data.kind,
            data.amount,
            data.category_id,
            &data.description,
            data.date,
            created_at,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_transaction(user_id, id, connection)
}

/// Retrieve one of the user's transactions.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user has no transaction with the ID.
pub fn get_transaction(
    user_id: UserID,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, user_id, kind, amount, category_id, description, date, created_at
            FROM \"transaction\" WHERE id = :id AND user_id = :user_id;",
        )?
        .query_row(
            &[(":id", &transaction_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the user's transactions, newest first, optionally limited to a date range.
pub fn get_transactions(
    user_id: UserID,
    range: Option<DateRange>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut query = "SELECT id, user_id, kind, amount, category_id, description, date, created_at
        FROM \"transaction\" WHERE user_id = ?1"
        .to_owned();
    let mut params = vec![Value::Integer(user_id.as_i64())];

    if let Some(range) = range {
        query.push_str(" AND date BETWEEN ?2 AND ?3");
        params.push(Value::Text(range.start().to_string()));
        params.push(Value::Text(range.end().to_string()));
    }

    // Sort by date, and then ID to keep transaction order stable after updates
    query.push_str(" ORDER BY date DESC, id DESC;");

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params), map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Replace the fields of one of the user's transactions. The creation time is kept.
///
/// # Errors
///
/// Returns [Error::UpdateMissingTransaction] if the user has no transaction with the ID, and the
/// same validation errors as [create_transaction].
pub fn update_transaction(
    user_id: UserID,
    transaction_id: TransactionId,
    data: TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate(user_id, &data, connection)?;

    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET kind = ?1, amount = ?2, category_id = ?3, description = ?4, date = ?5
        WHERE id = ?6 AND user_id = ?7;",
        (
            data.kind,
            data.amount,
            data.category_id,
            &data.description,
            data.date,
            transaction_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    get_transaction(user_id, transaction_id, connection)
}

/// Delete one of the user's transactions.
///
/// # Errors
///
/// Returns [Error::DeleteMissingTransaction] if the user has no transaction with the ID.
pub fn delete_transaction(
    user_id: UserID,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2;",
        (transaction_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Initialize the transaction table and indexes.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            amount REAL NOT NULL CHECK (amount > 0),
            category_id INTEGER REFERENCES category(id) ON DELETE SET NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
    )
}

fn validate(user_id: UserID, data: &TransactionData, connection: &Connection) -> Result<(), Error> {
    data.validate()?;

    let category = match data.category_id {
        Some(category_id) => find_category(user_id, category_id, connection)?,
        None => None,
    };

    ensure_category_matches(data.kind, data.category_id, category.as_ref())
}

fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: row.get(2)?,
        amount: row.get(3)?,
        category_id: row.get(4)?,
        description: row.get(5)?,
        date: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod transaction_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        CategoryData, CategoryName, DateRange, Error, PasswordHash, TransactionData,
        TransactionKind, UserID,
        service::{
            auth_user::create_auth_user,
            category::{create_category, delete_category, update_category},
            initialize,
            transaction::{
                create_transaction, delete_transaction, get_transaction, get_transactions,
                update_transaction,
            },
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

    fn expense(amount: f64, day: u8) -> TransactionData {
        let date = date!(2025 - 01 - 01).replace_day(day).unwrap();
        TransactionData::new(TransactionKind::Expense, amount, date).unwrap()
    }

    #[test]
    fn create_transaction_succeeds() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();

        let transaction = create_transaction(
            user_id,
            expense(12.3, 4).category(Some(category.id)).description("Lunch"),
            &connection,
        )
        .expect("Could not create transaction");

        assert!(transaction.id > 0);
        assert_eq!(
            get_transaction(user_id, transaction.id, &connection),
            Ok(transaction)
        );
    }

    #[test]
    fn create_transaction_rejects_category_of_other_kind() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();
        let data = TransactionData::new(TransactionKind::Income, 10.0, date!(2025 - 01 - 01))
            .unwrap()
            .category(Some(category.id));

        let result = create_transaction(user_id, data, &connection);

        assert_eq!(result, Err(Error::InvalidCategory(Some(category.id))));
    }

    #[test]
    fn create_transaction_rejects_category_of_other_user() {
        let (connection, jane, john) = get_test_db_connection();
        let category = create_category(jane, food(), &connection).unwrap();

        let result = create_transaction(john, expense(1.0, 1).category(Some(category.id)), &connection);

        assert_eq!(result, Err(Error::InvalidCategory(Some(category.id))));
    }

    #[test]
    fn create_transaction_rejects_non_positive_amount() {
        let (connection, user_id, _) = get_test_db_connection();
        let mut data = expense(1.0, 1);
        data.amount = 0.0;

        let result = create_transaction(user_id, data, &connection);

        assert_eq!(result, Err(Error::InvalidAmount(0.0)));
    }

    #[test]
    fn get_transactions_filters_by_range_and_owner() {
        let (connection, jane, john) = get_test_db_connection();
        let early = create_transaction(jane, expense(1.0, 2), &connection).unwrap();
        let late = create_transaction(jane, expense(2.0, 20), &connection).unwrap();
        create_transaction(jane, expense(3.0, 31), &connection).unwrap();
        create_transaction(john, expense(4.0, 10), &connection).unwrap();

        let range = DateRange::new(date!(2025 - 01 - 01), date!(2025 - 01 - 20)).unwrap();
        let got = get_transactions(jane, Some(range), &connection).unwrap();

        assert_eq!(got, vec![late, early]);
        assert_eq!(get_transactions(jane, None, &connection).unwrap().len(), 3);
    }

    #[test]
    fn update_transaction_keeps_creation_time() {
        let (connection, user_id, _) = get_test_db_connection();
        let transaction = create_transaction(user_id, expense(1.0, 2), &connection).unwrap();

        let updated = update_transaction(
            user_id,
            transaction.id,
            expense(9.5, 3).description("Dinner"),
            &connection,
        )
        .unwrap();

        assert_eq!(updated.amount, 9.5);
        assert_eq!(updated.description, "Dinner");
        assert_eq!(updated.created_at, transaction.created_at);
    }

    #[test]
    fn update_and_delete_of_other_users_transaction_fail() {
        let (connection, jane, john) = get_test_db_connection();
        let transaction = create_transaction(jane, expense(1.0, 2), &connection).unwrap();

        assert_eq!(
            update_transaction(john, transaction.id, expense(2.0, 2), &connection),
            Err(Error::UpdateMissingTransaction)
        );
        assert_eq!(
            delete_transaction(john, transaction.id, &connection),
            Err(Error::DeleteMissingTransaction)
        );
        assert!(get_transaction(jane, transaction.id, &connection).is_ok());
    }

    #[test]
    fn deleting_category_keeps_transaction_uncategorized() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();
        let transaction = create_transaction(
            user_id,
            expense(5.0, 1).category(Some(category.id)),
            &connection,
        )
        .unwrap();

        delete_category(user_id, category.id, &connection).unwrap();

        let got = get_transaction(user_id, transaction.id, &connection).unwrap();
        assert_eq!(got.category_id, None);
    }

    #[test]
    fn changing_category_kind_detaches_transactions() {
        let (connection, user_id, _) = get_test_db_connection();
        let category = create_category(user_id, food(), &connection).unwrap();
        let transaction = create_transaction(
            user_id,
            expense(5.0, 1).category(Some(category.id)),
            &connection,
        )
        .unwrap();

        update_category(
            user_id,
            category.id,
            CategoryData::new(CategoryName::new_unchecked("Food"), TransactionKind::Income),
            &connection,
        )
        .unwrap();

        let got = get_transaction(user_id, transaction.id, &connection).unwrap();
        assert_eq!(got.category_id, None);
    }

    #[test]
    fn delete_transaction_succeeds() {
        let (connection, user_id, _) = get_test_db_connection();
        let transaction = create_transaction(user_id, expense(1.0, 2), &connection).unwrap();

        delete_transaction(user_id, transaction.id, &connection).unwrap();

        assert_eq!(
            get_transaction(user_id, transaction.id, &connection),
            Err(Error::NotFound)
        );
    }
}

//! Database setup and the SQL conversions shared by the service's tables.

use rusqlite::{
    Connection, ToSql, Transaction as SqlTransaction, TransactionBehavior,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};

use crate::{
    Error, TransactionKind,
    service::{
        auth_user::create_auth_user_table, category::create_category_table,
        profile::create_profile_table, session_token::create_session_table,
        transaction::create_transaction_table,
    },
};

/// Create the service's tables if they do not exist yet.
///
/// # Errors
///
/// Returns an error if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Foreign keys are off by default in SQLite and cannot be enabled inside a transaction.
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_auth_user_table(&transaction)?;
    create_session_table(&transaction)?;
    create_profile_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

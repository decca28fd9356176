//! Route handlers for the current user's transactions.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    Error, Transaction, TransactionData, TransactionId, UserID,
    api::TransactionQuery,
    service::{
        state::DataState,
        transaction::{
            create_transaction, delete_transaction, get_transactions, update_transaction,
        },
    },
};

/// List the current user's transactions, newest first.
///
/// The optional `start` and `end` query parameters limit the list to an inclusive date range.
pub async fn get_transactions_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let range = query.date_range()?;

    get_transactions(user_id, range, &*state.connection()?).map(Json)
}

/// Record a transaction.
pub async fn create_transaction_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<TransactionData>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let transaction = create_transaction(user_id, data, &*state.connection()?)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Replace a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(data): Json<TransactionData>,
) -> Result<Json<Transaction>, Error> {
    update_transaction(user_id, transaction_id, data, &*state.connection()?).map(Json)
}

/// Delete a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    delete_transaction(user_id, transaction_id, &*state.connection()?)?;

    Ok(StatusCode::NO_CONTENT)
}

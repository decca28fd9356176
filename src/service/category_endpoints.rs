//! Route handlers for the current user's categories.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Category, CategoryData, CategoryId, Error, UserID,
    service::{
        category::{create_category, delete_category, get_categories, update_category},
        state::DataState,
    },
};

/// List the current user's categories.
pub async fn get_categories_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Category>>, Error> {
    get_categories(user_id, &*state.connection()?).map(Json)
}

/// Create a category.
pub async fn create_category_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<CategoryData>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let category = create_category(user_id, data, &*state.connection()?)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Replace a category.
pub async fn update_category_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
    Json(data): Json<CategoryData>,
) -> Result<Json<Category>, Error> {
    update_category(user_id, category_id, data, &*state.connection()?).map(Json)
}

/// Delete a category, leaving its transactions uncategorized.
pub async fn delete_category_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    delete_category(user_id, category_id, &*state.connection()?)?;

    Ok(StatusCode::NO_CONTENT)
}

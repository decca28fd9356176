//! Route handlers for the current user's profile.

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    Error, Profile, UserID,
    service::{
        auth_user::get_auth_user,
        profile::{create_profile, get_profile, update_profile},
        state::DataState,
    },
    user::{NewProfile, ProfileUpdate},
};

/// Get the current user's profile.
pub async fn get_profile_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Profile>, Error> {
    get_profile(user_id, &*state.connection()?).map(Json)
}

/// Create the current user's profile and default categories.
///
/// The email address always comes from the user's account, whatever the request says.
pub async fn create_profile_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Json(new_profile): Json<NewProfile>,
) -> Result<(StatusCode, Json<Profile>), Error> {
    let connection = state.connection()?;
    let user = get_auth_user(user_id, &connection)?;

    let new_profile = NewProfile {
        email: user.email,
        ..new_profile
    };

    let profile = create_profile(user_id, &new_profile, &connection)?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Update the current user's profile.
pub async fn update_profile_endpoint(
    State(state): State<DataState>,
    Extension(user_id): Extension<UserID>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, Error> {
    update_profile(user_id, &update, &*state.connection()?).map(Json)
}

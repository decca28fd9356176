//! Middleware that checks the API key and bearer access tokens.

use axum::{
    RequestPartsExt,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    Error,
    api::API_KEY_HEADER,
    service::{
        session_token::get_session_user,
        state::{DataState, ServiceState},
    },
};

/// The raw access token of an authenticated request.
///
/// Route handlers can use the function argument `Extension(token): Extension<AccessToken>` to
/// receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken(pub String);

/// Middleware function that rejects requests without the service's API key.
pub async fn api_key_guard(
    State(state): State<ServiceState>,
    request: Request,
    next: Next,
) -> Response {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if api_key != Some(state.config.api_key.as_str()) {
        return Error::InvalidApiKey.into_response();
    }

    next.run(request).await
}

/// Middleware function that checks for a valid bearer access token.
///
/// The user ID and access token are placed into the request and then the request is executed
/// normally if the token is valid, otherwise an [Error::InvalidToken] response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>`
/// to receive the user ID.
pub async fn auth_guard(State(state): State<DataState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let token = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
        Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_owned(),
        Err(_) => return Error::InvalidToken.into_response(),
    };

    let user_id = match state
        .connection()
        .and_then(|connection| get_session_user(&token, &connection))
    {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user_id);
    parts.extensions.insert(AccessToken(token));

    next.run(Request::from_parts(parts, body)).await
}

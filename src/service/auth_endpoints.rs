//! Route handlers for accounts and sessions.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};

use crate::{
    Error, PasswordHash, UserID, ValidatedPassword,
    api::{
        AuthSession, ConfirmRequest, EmailRequest, PasswordGrant, RefreshGrant, SignUpRequest,
        SignUpResponse,
    },
    service::{
        auth_user::{
            confirm_email, create_auth_user, get_auth_user, get_auth_user_by_email,
            replace_confirmation_token,
        },
        middleware::AccessToken,
        session_token::{create_session, hash_token, new_token, refresh_session, revoke_session},
        state::ServiceState,
    },
    user::{AuthUser, normalize_email},
};

/// Create an account.
///
/// If the service requires email confirmation, the response has no session and the
/// confirmation token is written to the log, otherwise the new user is signed in straight away.
pub async fn sign_up_endpoint(
    State(state): State<ServiceState>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), Error> {
    let name = request.name.trim();

    if name.is_empty() {
        return Err(Error::MissingField("name".to_owned()));
    }

    let email = normalize_email(&request.email)?;
    let password = ValidatedPassword::new(&request.password)?;
    let password_hash = PasswordHash::new(password, state.config.password_hash_cost)?;
    let confirmation_token = state.config.require_email_confirmation.then(new_token);

    let connection = state.connection()?;
    let user = create_auth_user(
        name,
        &email,
        &password_hash,
        confirmation_token.as_deref().map(hash_token).as_deref(),
        &connection,
    )?;

    let session = match confirmation_token {
        Some(token) => {
            tracing::info!("Email confirmation token for {email}: {token}");
            None
        }
        None => Some(create_session(
            user.clone(),
            state.config.session_duration,
            &connection,
        )?),
    };

    Ok((StatusCode::CREATED, Json(SignUpResponse { user, session })))
}

/// Exchange an email and password for a session.
pub async fn sign_in_endpoint(
    State(state): State<ServiceState>,
    Json(grant): Json<PasswordGrant>,
) -> Result<Json<AuthSession>, Error> {
    let email = grant.email.trim().to_lowercase();

    let found = get_auth_user_by_email(&email, &*state.connection()?);
    let (user, password_hash) = match found {
        Ok(found) => found,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    let password_is_correct = password_hash.verify(&grant.password).map_err(|error| {
        tracing::error!("Error verifying password: {error}");
        Error::HashingError(error.to_string())
    })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    if !user.email_confirmed {
        return Err(Error::EmailNotConfirmed);
    }

    create_session(user, state.config.session_duration, &*state.connection()?).map(Json)
}

/// Exchange a refresh token for a new session.
pub async fn refresh_endpoint(
    State(state): State<ServiceState>,
    Json(grant): Json<RefreshGrant>,
) -> Result<Json<AuthSession>, Error> {
    refresh_session(
        &grant.refresh_token,
        state.config.session_duration,
        &*state.connection()?,
    )
    .map(Json)
}

/// Revoke the session of the request's access token.
pub async fn log_out_endpoint(
    State(state): State<ServiceState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<StatusCode, Error> {
    revoke_session(&token, &*state.connection()?)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Issue a new confirmation token for an unconfirmed account.
///
/// The response is the same whether or not the account exists, so the route cannot be used
/// to find out which email addresses are registered.
pub async fn resend_confirmation_endpoint(
    State(state): State<ServiceState>,
    Json(request): Json<EmailRequest>,
) -> Result<StatusCode, Error> {
    let email = normalize_email(&request.email)?;
    let token = new_token();

    if replace_confirmation_token(&email, &hash_token(&token), &*state.connection()?)? {
        tracing::info!("Email confirmation token for {email}: {token}");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Confirm an email address with the token issued at sign up.
pub async fn confirm_email_endpoint(
    State(state): State<ServiceState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<AuthUser>, Error> {
    confirm_email(&hash_token(request.token.trim()), &*state.connection()?).map(Json)
}

/// Get the account of the request's access token.
pub async fn get_user_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<AuthUser>, Error> {
    get_auth_user(user_id, &*state.connection()?).map(Json)
}

#[cfg(test)]
mod auth_endpoint_tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::{TestRequest, TestServer};
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        api::{AuthSession, ErrorBody, SignUpResponse},
        service::{ServiceConfig, ServiceState, build_router, endpoints},
        user::AuthUser,
    };

    const API_KEY: &str = "test-api-key";

    fn get_test_server(config: ServiceConfig) -> TestServer {
        let state = ServiceState::new(
            Connection::open_in_memory().unwrap(),
            config.password_hash_cost(4),
        )
        .unwrap();

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    fn with_api_key(request: TestRequest) -> TestRequest {
        request.add_header(
            HeaderName::from_static("apikey"),
            HeaderValue::from_static(API_KEY),
        )
    }

    async fn sign_up(server: &TestServer, email: &str, password: &str) -> axum_test::TestResponse {
        with_api_key(server.post(endpoints::SIGN_UP))
            .json(&json!({"name": "Jane", "email": email, "password": password}))
            .await
    }

    #[tokio::test]
    async fn sign_up_returns_session() {
        let server = get_test_server(ServiceConfig::new(API_KEY));

        let response = sign_up(&server, "Jane@Example.com", "averylongpassword").await;

        response.assert_status(StatusCode::CREATED);
        let body: SignUpResponse = response.json();
        assert_eq!(body.user.email, "jane@example.com");
        assert!(body.user.email_confirmed);
        assert!(body.session.is_some());
    }

    #[tokio::test]
    async fn sign_up_fails_on_short_password() {
        let server = get_test_server(ServiceConfig::new(API_KEY));

        let response = sign_up(&server, "jane@example.com", "1234567").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.code, "password_too_short");
        assert_eq!(body.detail, Some("8".to_owned()));
    }

    #[tokio::test]
    async fn sign_up_fails_on_duplicate_email() {
        let server = get_test_server(ServiceConfig::new(API_KEY));
        sign_up(&server, "jane@example.com", "averylongpassword").await;

        let response = sign_up(&server, "JANE@example.com", "anotherlongpassword").await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<ErrorBody>().code, "email_exists");
    }

    #[tokio::test]
    async fn sign_in_fails_on_unknown_email_and_wrong_password() {
        let server = get_test_server(ServiceConfig::new(API_KEY));
        sign_up(&server, "jane@example.com", "averylongpassword").await;

        for (email, password) in [
            ("nobody@example.com", "averylongpassword"),
            ("jane@example.com", "thewrongpassword"),
        ] {
            let response = with_api_key(server.post(endpoints::TOKEN))
                .json(&json!({"email": email, "password": password}))
                .await;

            response.assert_status(StatusCode::UNAUTHORIZED);
            assert_eq!(response.json::<ErrorBody>().code, "invalid_credentials");
        }
    }

    #[tokio::test]
    async fn unconfirmed_user_cannot_sign_in_until_confirmed() {
        let server = get_test_server(ServiceConfig::new(API_KEY).require_email_confirmation(true));
        let response = sign_up(&server, "jane@example.com", "averylongpassword").await;
        response.assert_status(StatusCode::CREATED);
        assert!(response.json::<SignUpResponse>().session.is_none());

        let response = with_api_key(server.post(endpoints::TOKEN))
            .json(&json!({"email": "jane@example.com", "password": "averylongpassword"}))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<ErrorBody>().code, "email_not_confirmed");
    }

    #[tokio::test]
    async fn confirm_with_unknown_token_fails() {
        let server = get_test_server(ServiceConfig::new(API_KEY));

        let response = with_api_key(server.post(endpoints::CONFIRM_EMAIL))
            .json(&json!({"token": "made-up"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<ErrorBody>().code,
            "invalid_confirmation_token"
        );
    }

    #[tokio::test]
    async fn resend_confirmation_does_not_reveal_accounts() {
        let server = get_test_server(ServiceConfig::new(API_KEY).require_email_confirmation(true));
        sign_up(&server, "jane@example.com", "averylongpassword").await;

        for email in ["jane@example.com", "nobody@example.com"] {
            with_api_key(server.post(endpoints::RESEND_CONFIRMATION))
                .json(&json!({ "email": email }))
                .await
                .assert_status(StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn get_user_and_log_out() {
        let server = get_test_server(ServiceConfig::new(API_KEY));
        let response = sign_up(&server, "jane@example.com", "averylongpassword").await;
        let session: AuthSession = response
            .json::<SignUpResponse>()
            .session
            .expect("sign up should return a session");

        let user: AuthUser = with_api_key(server.get(endpoints::AUTH_USER))
            .authorization_bearer(&session.access_token)
            .await
            .json();
        assert_eq!(user, session.user);

        with_api_key(server.post(endpoints::LOG_OUT))
            .authorization_bearer(&session.access_token)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        with_api_key(server.get(endpoints::AUTH_USER))
            .authorization_bearer(&session.access_token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_returns_new_session() {
        let server = get_test_server(ServiceConfig::new(API_KEY));
        let session = sign_up(&server, "jane@example.com", "averylongpassword")
            .await
            .json::<SignUpResponse>()
            .session
            .expect("sign up should return a session");

        let refreshed: AuthSession = with_api_key(server.post(endpoints::REFRESH))
            .json(&json!({"refresh_token": session.refresh_token}))
            .await
            .json();

        assert_ne!(refreshed.access_token, session.access_token);
        assert_eq!(refreshed.user, session.user);
    }
}

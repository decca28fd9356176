//! Service router configuration with public and protected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    Error,
    service::{
        auth_endpoints::{
            confirm_email_endpoint, get_user_endpoint, log_out_endpoint, refresh_endpoint,
            resend_confirmation_endpoint, sign_in_endpoint, sign_up_endpoint,
        },
        category_endpoints::{
            create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
            update_category_endpoint,
        },
        endpoints,
        logging::logging_middleware,
        middleware::{api_key_guard, auth_guard},
        profile_endpoints::{
            create_profile_endpoint, get_profile_endpoint, update_profile_endpoint,
        },
        state::ServiceState,
        transaction_endpoints::{
            create_transaction_endpoint, delete_transaction_endpoint, get_transactions_endpoint,
            update_transaction_endpoint,
        },
    },
};

/// Return a router with all the service's routes.
///
/// Every route needs the API key. All routes except signing up, signing in, refreshing and
/// email confirmation also need a bearer access token.
pub fn build_router(state: ServiceState) -> Router {
    let public_routes = Router::new()
        .route(endpoints::SIGN_UP, post(sign_up_endpoint))
        .route(endpoints::TOKEN, post(sign_in_endpoint))
        .route(endpoints::REFRESH, post(refresh_endpoint))
        .route(
            endpoints::RESEND_CONFIRMATION,
            post(resend_confirmation_endpoint),
        )
        .route(endpoints::CONFIRM_EMAIL, post(confirm_email_endpoint));

    let protected_routes = Router::new()
        .route(endpoints::LOG_OUT, post(log_out_endpoint))
        .route(endpoints::AUTH_USER, get(get_user_endpoint))
        .route(
            endpoints::PROFILE,
            get(get_profile_endpoint)
                .post(create_profile_endpoint)
                .patch(update_profile_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    public_routes
        .merge(protected_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), api_key_guard))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}

#[cfg(test)]
mod routing_tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::{TestRequest, TestServer};
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        Category, Profile, Transaction,
        api::{AuthSession, ErrorBody, SignUpResponse},
        category::{default_categories, find_by_name},
        service::{
            ServiceConfig, ServiceState, build_router,
            endpoints::{self, format_endpoint},
        },
    };

    const API_KEY: &str = "test-api-key";

    fn get_test_server() -> TestServer {
        let state = ServiceState::new(
            Connection::open_in_memory().unwrap(),
            ServiceConfig::new(API_KEY).password_hash_cost(4),
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

    fn authorized(request: TestRequest, session: &AuthSession) -> TestRequest {
        with_api_key(request).authorization_bearer(&session.access_token)
    }

    /// Sign up a user and create their profile.
    async fn onboard(server: &TestServer, email: &str) -> AuthSession {
        let session = with_api_key(server.post(endpoints::SIGN_UP))
            .json(&json!({"name": "Jane", "email": email, "password": "averylongpassword"}))
            .await
            .json::<SignUpResponse>()
            .session
            .expect("sign up should return a session");

        authorized(server.post(endpoints::PROFILE), &session)
            .json(&json!({"email": email, "display_name": "Jane"}))
            .await
            .assert_status(StatusCode::CREATED);

        session
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let server = get_test_server();

        let response = with_api_key(server.get("/nope")).await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<ErrorBody>().code, "not_found");
    }

    #[tokio::test]
    async fn data_routes_need_a_token() {
        let server = get_test_server();

        for path in [endpoints::PROFILE, endpoints::CATEGORIES, endpoints::TRANSACTIONS] {
            with_api_key(server.get(path))
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn profile_is_created_once_with_default_categories() {
        let server = get_test_server();
        let session = onboard(&server, "jane@example.com").await;

        let profile: Profile = authorized(server.get(endpoints::PROFILE), &session)
            .await
            .json();
        assert_eq!(profile.email, "jane@example.com");
        assert!(!profile.profile_complete);

        let categories: Vec<Category> = authorized(server.get(endpoints::CATEGORIES), &session)
            .await
            .json();
        assert_eq!(categories.len(), default_categories().len());

        let response = authorized(server.post(endpoints::PROFILE), &session)
            .json(&json!({"email": "jane@example.com", "display_name": "Jane"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<ErrorBody>().code, "duplicate_profile");
    }

    #[tokio::test]
    async fn profile_email_comes_from_account() {
        let server = get_test_server();
        let session = with_api_key(server.post(endpoints::SIGN_UP))
            .json(&json!({"name": "Jane", "email": "jane@example.com", "password": "averylongpassword"}))
            .await
            .json::<SignUpResponse>()
            .session
            .unwrap();

        let profile: Profile = authorized(server.post(endpoints::PROFILE), &session)
            .json(&json!({"email": "someone-else@example.com", "display_name": "Jane"}))
            .await
            .json();

        assert_eq!(profile.email, "jane@example.com");
    }

    #[tokio::test]
    async fn deleting_food_leaves_its_transaction_uncategorized() {
        let server = get_test_server();
        let session = onboard(&server, "jane@example.com").await;
        let categories: Vec<Category> = authorized(server.get(endpoints::CATEGORIES), &session)
            .await
            .json();
        let food = find_by_name(&categories, "Food", None).expect("Food should be a default");

        let transaction: Transaction = authorized(server.post(endpoints::TRANSACTIONS), &session)
            .json(&json!({
                "kind": "expense",
                "amount": 23.5,
                "category_id": food.id,
                "description": "Groceries",
                "date": "2025-01-15",
            }))
            .await
            .json();
        assert_eq!(transaction.category_id, Some(food.id));

        authorized(
            server.delete(&format_endpoint(endpoints::CATEGORY, food.id)),
            &session,
        )
        .await
        .assert_status(StatusCode::NO_CONTENT);

        let transactions: Vec<Transaction> =
            authorized(server.get(endpoints::TRANSACTIONS), &session)
                .await
                .json();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, transaction.id);
        assert_eq!(transactions[0].category_id, None);
    }

    #[tokio::test]
    async fn duplicate_category_is_a_conflict() {
        let server = get_test_server();
        let session = onboard(&server, "jane@example.com").await;

        let response = authorized(server.post(endpoints::CATEGORIES), &session)
            .json(&json!({"name": "food", "kind": "expense"}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: ErrorBody = response.json();
        assert_eq!(body.code, "duplicate_category");
        assert_eq!(body.detail, Some("food".to_owned()));
    }

    #[tokio::test]
    async fn transactions_are_filtered_by_date_range() {
        let server = get_test_server();
        let session = onboard(&server, "jane@example.com").await;

        for date in ["2025-01-10", "2025-02-10", "2025-03-10"] {
            authorized(server.post(endpoints::TRANSACTIONS), &session)
                .json(&json!({"kind": "income", "amount": 100.0, "date": date}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let transactions: Vec<Transaction> =
            authorized(server.get(endpoints::TRANSACTIONS), &session)
                .add_query_param("start", "2025-02-01")
                .add_query_param("end", "2025-03-31")
                .await
                .json();

        let dates: Vec<String> = transactions.iter().map(|t| t.date.to_string()).collect();
        assert_eq!(dates, vec!["2025-03-10", "2025-02-10"]);
    }

    #[tokio::test]
    async fn invalid_date_range_is_a_bad_request() {
        let server = get_test_server();
        let session = onboard(&server, "jane@example.com").await;

        let response = authorized(server.get(endpoints::TRANSACTIONS), &session)
            .add_query_param("start", "2025-03-01")
            .add_query_param("end", "2025-01-01")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ErrorBody>().code, "invalid_date_range");
    }

    #[tokio::test]
    async fn users_cannot_touch_each_others_data() {
        let server = get_test_server();
        let jane = onboard(&server, "jane@example.com").await;
        let john = onboard(&server, "john@example.com").await;

        let transaction: Transaction = authorized(server.post(endpoints::TRANSACTIONS), &jane)
            .json(&json!({"kind": "expense", "amount": 5.0, "date": "2025-01-01"}))
            .await
            .json();

        let johns: Vec<Transaction> = authorized(server.get(endpoints::TRANSACTIONS), &john)
            .await
            .json();
        assert!(johns.is_empty());

        let path = format_endpoint(endpoints::TRANSACTION, transaction.id);
        authorized(server.delete(&path), &john)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        authorized(server.put(&path), &john)
            .json(&json!({"kind": "expense", "amount": 1.0, "date": "2025-01-01"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let janes: Vec<Transaction> = authorized(server.get(endpoints::TRANSACTIONS), &jane)
            .await
            .json();
        assert_eq!(janes, vec![transaction]);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let server = get_test_server();
        let session = onboard(&server, "jane@example.com").await;

        let response = authorized(server.post(endpoints::TRANSACTIONS), &session)
            .json(&json!({"kind": "expense", "amount": -5.0, "date": "2025-01-01"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ErrorBody>().code, "invalid_amount");
    }
}

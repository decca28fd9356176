//! The service's endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/rest/categories/{category_id}', use
//! [format_endpoint].

/// The route for creating an account.
pub const SIGN_UP: &str = "/auth/signup";
/// The route for exchanging an email and password for a session.
pub const TOKEN: &str = "/auth/token";
/// The route for exchanging a refresh token for a new session.
pub const REFRESH: &str = "/auth/refresh";
/// The route for revoking the current session.
pub const LOG_OUT: &str = "/auth/logout";
/// The route for requesting a new email confirmation token.
pub const RESEND_CONFIRMATION: &str = "/auth/resend";
/// The route for confirming an email address.
pub const CONFIRM_EMAIL: &str = "/auth/confirm";
/// The route for the account of the current session.
pub const AUTH_USER: &str = "/auth/user";
/// The route for the profile of the current user.
pub const PROFILE: &str = "/rest/profile";
/// The route for the current user's categories.
pub const CATEGORIES: &str = "/rest/categories";
/// The route for a single category.
pub const CATEGORY: &str = "/rest/categories/{category_id}";
/// The route for the current user's transactions.
pub const TRANSACTIONS: &str = "/rest/transactions";
/// The route for a single transaction.
pub const TRANSACTION: &str = "/rest/transactions/{transaction_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter starts with a left brace and ends with a right brace, e.g. '{category_id}' in
/// '/rest/categories/{category_id}'. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the function returns the original path.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

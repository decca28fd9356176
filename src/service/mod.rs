//! The hosted service: a JSON API over SQLite that owns accounts, sessions, profiles,
//! categories and transactions.
//!
//! Every request must carry the service's API key. Data routes also need a bearer access token,
//! and every query they run is scoped to the user the token belongs to.

mod auth_endpoints;
mod auth_user;
mod category;
mod category_endpoints;
mod db;
pub mod endpoints;
mod logging;
mod middleware;
mod profile;
mod profile_endpoints;
mod response;
mod routing;
mod session_token;
mod state;
mod transaction;
mod transaction_endpoints;

pub use db::initialize;
pub use routing::build_router;
pub use state::{ServiceConfig, ServiceState};

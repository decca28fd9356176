//! Client configuration read from the environment.

use std::path::PathBuf;

/// The service URL used when `BUDGET_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
/// The local storage directory used when `BUDGET_DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = ".budget_tracker";

/// Where the client finds the hosted service and keeps its local storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// The base URL of the hosted service, from `BUDGET_API_URL`.
    pub api_url: String,
    /// The service's API key, from `BUDGET_API_KEY`.
    pub api_key: String,
    /// The directory for local storage, from `BUDGET_DATA_DIR`.
    pub data_dir: PathBuf,
    /// Keep every account on this device instead of the hosted service, from `BUDGET_OFFLINE`.
    pub offline: bool,
}

impl ClientConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration with `lookup`, which maps variable names to values.
    ///
    /// Unset and blank variables fall back to the defaults. A missing API key is left empty,
    /// which the service will reject, but demo sessions still work.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        Self {
            api_url: read("BUDGET_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            api_key: read("BUDGET_API_KEY").unwrap_or_default(),
            data_dir: read("BUDGET_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            offline: read("BUDGET_OFFLINE").is_some_and(|value| is_truthy(&value)),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.eq_ignore_ascii_case(truthy))
}

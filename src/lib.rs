pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod poller;
pub mod rank;
pub mod state;
pub mod types;

/// VK method endpoint; the method name is appended to this base.
pub const VK_API_BASE: &str = "https://api.vk.com/method/";

/// Protocol version sent as `v` on every call.
pub const VK_API_VERSION: &str = "5.126";

/// VK error code for an expired or revoked access token.
pub const TOKEN_EXPIRED_CODE: i64 = 5;

/// Name of the VK web session cookie used by the scrape strategy.
pub const SESSION_COOKIE: &str = "remixsid";

/// One day in seconds.
pub const DAY_SECS: i64 = 86_400;

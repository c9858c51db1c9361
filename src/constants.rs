//! Central Configuration Constants
//!
//! Single source of truth for configuration defaults.

/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;

/// Default classifier artifact location
pub const DEFAULT_MODEL_PATH: &str = "artifacts/heart_model.json";

/// Default static asset directory
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// Default bound on concurrently running predictions
pub const DEFAULT_MAX_CONCURRENT_PREDICTIONS: usize = 4;

/// Default log filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "heart_risk_server=debug,tower_http=debug";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Heart Risk Server";

//! HTTP request handlers.

pub mod authorize;
pub mod health;
pub mod me;
pub mod metrics;

pub use authorize::{authorize, authorize_policy};
pub use health::health_check;
pub use me::get_me;
pub use metrics::metrics_handler;

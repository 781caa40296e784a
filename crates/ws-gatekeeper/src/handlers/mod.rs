//! HTTP and WebSocket handlers.

pub mod health;
pub mod metrics;
pub mod ws;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use ws::ws_handler;

//! Background tasks.
//!
//! - `heartbeat` - pings connected sessions and closes unresponsive ones

pub mod heartbeat;

pub use heartbeat::HeartbeatMonitor;

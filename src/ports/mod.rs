//! Port traits the domain consumes; concrete implementations live in
//! [`adapters`](crate::adapters).

pub mod calendar_port;
pub mod config_port;
pub mod data_port;
pub mod metrics_port;

//! Persistent connections to shuttle hubs.
//!
//! The [`ConnectionManager`] owns the hub registry, one TCP link per hub of
//! interest, the fixed-interval reconnect loops for dropped links, and the
//! periodic liveness monitor. Everything the presentation layer needs comes
//! out of one typed [`HubEvent`] channel; the core never holds a handle to
//! a UI surface.

pub mod config;
pub mod liveness;
pub mod manager;
pub mod pumps;
pub mod reconnection;
pub mod registry;
pub mod types;

pub use config::{CoreConfig, ScanRangeConfig};
pub use manager::ConnectionManager;
pub use registry::HubRegistry;
pub use types::{ConnectionError, ConnectionState, HubEvent};

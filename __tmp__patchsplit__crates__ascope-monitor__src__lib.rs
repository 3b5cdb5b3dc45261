//! Session discovery, incremental tailing, and snapshot persistence across
//! every configured producer. Watches each provider's log root, feeds newly
//! appended events into a per-session [`ascope_aggregator::Aggregator`], and
//! publishes lifecycle and update events to anything subscribed via
//! [`SessionMonitor::receiver`].

mod bus;
mod config;
mod error;
mod monitor;
mod session;

pub use bus::{MonitorEvent, SessionPhase};
pub use config::{Config, ProviderConfig};
pub use error::{Error, Result};
pub use monitor::{ProviderContext, SessionMonitor, WatcherGuard};



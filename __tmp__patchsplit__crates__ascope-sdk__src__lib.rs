//! Public facade over the observability engine: discover provider log
//! roots, watch sessions live, and read back persisted snapshots, without
//! wiring `ascope-monitor`/`ascope-snapshot`/`ascope-aggregator` together by
//! hand.
//!
//! ```no_run
//! use ascope_sdk::AscopeClient;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AscopeClient::connect_default()?;
//! let mut stream = client.watch("project-hash")?;
//! while let Some(event) = stream.next().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod watch;

pub use ascope_aggregator::Aggregator;
pub use ascope_monitor::{Config, MonitorEvent, ProviderConfig, SessionPhase};
pub use ascope_snapshot::{SnapshotStore, StoredSnapshot};
pub use ascope_types::Event;

pub use client::AscopeClient;
pub use error::{Error, Result};
pub use watch::LiveStream;



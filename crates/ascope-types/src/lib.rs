//! Shared wire types for ascope: the `Event` model producers emit and the
//! incremental reader consumes. Kept dependency-light since every other
//! ascope crate builds on top of it.

mod content;
mod error;
mod event;
mod quota;
mod usage;

pub use content::{Block, Content};
pub use error::{Error, Result};
pub use event::{Event, Message, Role};
pub use quota::QuotaState;
pub use usage::Usage;

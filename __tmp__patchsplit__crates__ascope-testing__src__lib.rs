//! Test harness for ascope integration tests.
//!
//! - [`TestWorld`]: isolated temp directory with per-provider log roots and
//!   a snapshot store, for tests exercising the full client or a raw replay.
//! - [`fixtures`]: synthetic session log generation, one generator per
//!   provider wire format.
//! - [`assertions`]: assertions over aggregator and snapshot state.
//! - [`providers`]: provider identity used by the harness.

pub mod assertions;
pub mod fixtures;
pub mod providers;
pub mod world;

pub use world::TestWorld;



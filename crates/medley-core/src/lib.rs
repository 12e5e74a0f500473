#![forbid(unsafe_code)]
//! medley-core library.
//!
//! Per-user media consumption statistics: one aggregate row per
//! (user, media type), an append-only activity ledger, history snapshots,
//! and trend reconstruction over those snapshots. Writes go through the
//! delta applicator; reads are plain queries over the same store.
//!
//! # Conventions
//!
//! - **Errors**: library paths return [`error::StatsError`] via the crate's
//!   [`error::Result`]; binaries wrap with `anyhow` at the edges.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`,
//!   `debug!`, `trace!`).
//! - **Time**: microsecond UTC timestamps in `*_us` columns and fields.

pub mod db;
pub mod error;
pub mod media;
pub mod model;
pub mod trend;

pub use error::{Result, StatsError};
pub use media::{Dimension, MediaType, Status};
pub use model::{ActivityEvent, Delta, ListEntry, MediaAggregate, StatsSnapshot};

#![forbid(unsafe_code)]
//! medley-rank library.
//!
//! Read-side rankings over the aggregates maintained by `medley-core`:
//! per-dimension affinity scores ("which studios does this user love")
//! and the cross-media-type hall of fame. Everything here is computed at
//! read time from current data; nothing is persisted.
//!
//! # Conventions
//!
//! - **Errors**: fallible operations return [`medley_core::Result`].
//! - **Logging**: via `tracing`; rankings log at `debug`.
//! - **Time**: none of these reads take a clock; they see whatever the
//!   write side last committed.

pub mod affinity;
pub mod hall_of_fame;

pub use affinity::{AffinityRow, GroupStats, MIN_GROUP, TOP_N};
pub use hall_of_fame::{HofPage, HofRow, SortKey, TypeStanding};

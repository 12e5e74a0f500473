//! Data model: aggregates, deltas, list entries, ledger events, snapshots.

pub mod aggregate;
pub mod delta;
pub mod entry;
pub mod event;
pub mod snapshot;

pub use aggregate::MediaAggregate;
pub use delta::Delta;
pub use entry::ListEntry;
pub use event::ActivityEvent;
pub use snapshot::StatsSnapshot;

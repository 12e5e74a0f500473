#![forbid(unsafe_code)]
//! medley-achieve library.
//!
//! Achievements are a metric recipe (what to measure) plus an ascending
//! ladder of difficulty tiers (how much of it). The catalog is TOML,
//! upserted by code name; the batch calculator recomputes every user's
//! progress per achievement in set-based SQL; rarity is a separate pass.
//!
//! # Conventions
//!
//! - **Errors**: engine paths return `medley_core::StatsError`; catalog
//!   file loading uses `anyhow` with context, like any config boundary.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`,
//!   `debug!`, `trace!`). Batches log per-achievement at `info`,
//!   per-achievement failures at `warn`.

pub mod batch;
pub mod catalog;
pub mod query;
pub mod rarity;
pub mod recipe;

pub use batch::{BatchFailure, BatchReport};
pub use catalog::{Catalog, InstallReport};
pub use recipe::{AchievementDef, Difficulty, MetricKind, Recipe};

//! Shirizu tracking domain.
//!
//! Pure types and logic shared by the store, the tracker service and the
//! background worker. This crate has no database or network dependencies.
//!
//! - [`manga`] — manga / chapter snapshots as returned by sources.
//! - [`tracking`] — cursors, per-check results and tracking constants.
//! - [`diff`] — the chapter-list comparison engine.
//! - [`keyed_mutex`] — per-key async mutual exclusion.

pub mod branch;
pub mod channels;
pub mod diff;
pub mod error;
pub mod keyed_mutex;
pub mod manga;
pub mod tracking;
pub mod types;

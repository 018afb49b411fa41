//! Manga update tracking.
//!
//! - [`TrackingRepository`]: the tracking store (cursors, counters, log).
//! - [`Tracker`]: fetches fresh details from a source, compares them with
//!   the stored cursor and commits the result, one manga at a time.
//! - [`source`]: the capability used to fetch manga details, with an HTTP
//!   implementation in [`http_source`].

pub mod error;
pub mod http_source;
pub mod source;
pub mod store;
pub mod tracker;

pub use error::TrackerError;
pub use http_source::HttpMangaRepository;
pub use source::{CachePolicy, MangaRepository, MangaRepositoryFactory, RepositoryKind, SourceRegistry};
pub use store::TrackingRepository;
pub use tracker::Tracker;

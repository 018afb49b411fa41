//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! any SQLite executor as the first argument: `&DbPool` for standalone calls
//! or `&mut *tx` to take part in a transaction.

pub mod favourite_repo;
pub mod history_repo;
pub mod manga_repo;
pub mod track_log_repo;
pub mod track_repo;
pub mod worker_state_repo;

pub use favourite_repo::FavouriteRepo;
pub use history_repo::HistoryRepo;
pub use manga_repo::MangaRepo;
pub use track_log_repo::TrackLogRepo;
pub use track_repo::TrackRepo;
pub use worker_state_repo::WorkerStateRepo;

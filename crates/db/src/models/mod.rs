//! Row models.
//!
//! Each submodule contains a `FromRow` struct matching the database row and,
//! where the tracker needs one, the conversion into the domain type.

pub mod favourite;
pub mod history;
pub mod manga;
pub mod track;
pub mod track_log;

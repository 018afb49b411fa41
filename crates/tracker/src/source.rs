//! Manga details fetch capability.
//!
//! The tracker never talks to a site directly. It asks a
//! [`MangaRepositoryFactory`] for the [`MangaRepository`] serving a manga's
//! source and requests fresh details through it.

use std::sync::Arc;

use async_trait::async_trait;
use shirizu_core::error::CheckError;
use shirizu_core::manga::{Manga, MangaSource};

// ---------------------------------------------------------------------------
// CachePolicy
// ---------------------------------------------------------------------------

/// How a details request interacts with the repository's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Read from and write to the cache.
    #[default]
    Enabled,
    /// Serve from the cache when possible, never store.
    ReadOnly,
    /// Always fetch, then store the result. Used by update checks.
    WriteOnly,
    /// Bypass the cache entirely.
    Disabled,
}

impl CachePolicy {
    pub fn read_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::ReadOnly)
    }

    pub fn write_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::WriteOnly)
    }
}

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

/// Whether a repository is backed by a remote parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    Remote,
    Local,
}

/// Source of manga details.
#[async_trait]
pub trait MangaRepository: Send + Sync {
    fn kind(&self) -> RepositoryKind;

    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Full details of `manga`, including the chapter list.
    async fn get_details(&self, manga: &Manga, cache: CachePolicy) -> Result<Manga, CheckError>;
}

/// Resolves the repository serving a source.
pub trait MangaRepositoryFactory: Send + Sync {
    fn create(&self, source: &MangaSource) -> Arc<dyn MangaRepository>;
}

// ---------------------------------------------------------------------------
// Local repository and registry
// ---------------------------------------------------------------------------

/// Repository for manga imported from local files.
///
/// Local content does not change behind the user's back, so details are
/// the stored manga itself.
#[derive(Debug, Default)]
pub struct LocalMangaRepository;

#[async_trait]
impl MangaRepository for LocalMangaRepository {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Local
    }

    fn name(&self) -> &str {
        "LocalMangaRepository"
    }

    async fn get_details(&self, manga: &Manga, _cache: CachePolicy) -> Result<Manga, CheckError> {
        Ok(manga.clone())
    }
}

/// Factory routing local manga to [`LocalMangaRepository`] and every parser
/// source to one remote repository.
pub struct SourceRegistry {
    remote: Arc<dyn MangaRepository>,
    local: Arc<dyn MangaRepository>,
}

impl SourceRegistry {
    pub fn new(remote: Arc<dyn MangaRepository>) -> Self {
        Self {
            remote,
            local: Arc::new(LocalMangaRepository),
        }
    }
}

impl MangaRepositoryFactory for SourceRegistry {
    fn create(&self, source: &MangaSource) -> Arc<dyn MangaRepository> {
        match source {
            MangaSource::Local => Arc::clone(&self.local),
            MangaSource::Parser(_) => Arc::clone(&self.remote),
        }
    }
}

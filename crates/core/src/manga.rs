//! Manga and chapter snapshots.
//!
//! A [`Manga`] is what a source returns from a details request. The chapter
//! list is ordered oldest first and may interleave several branches
//! (translations); use [`Manga::chapters_for_branch`] to get one of them.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Source name used for content imported from local files.
pub const LOCAL_SOURCE: &str = "LOCAL";

// ---------------------------------------------------------------------------
// MangaSource
// ---------------------------------------------------------------------------

/// Where a manga comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MangaSource {
    /// Imported from local storage. Never checked for updates.
    Local,
    /// Provided by a named remote parser.
    Parser(String),
}

impl MangaSource {
    /// String representation for database storage.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => LOCAL_SOURCE,
            Self::Parser(name) => name,
        }
    }

    /// Whether this source is served by a remote parser.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Parser(_))
    }
}

impl From<String> for MangaSource {
    fn from(value: String) -> Self {
        if value == LOCAL_SOURCE {
            Self::Local
        } else {
            Self::Parser(value)
        }
    }
}

impl From<MangaSource> for String {
    fn from(value: MangaSource) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for MangaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MangaChapter
// ---------------------------------------------------------------------------

/// A single chapter as listed by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaChapter {
    /// Stable identifier, unique within the manga.
    pub id: DbId,
    pub name: String,
    pub number: f32,
    pub upload_date: Option<Timestamp>,
    /// Translation / release track. `None` for single-branch manga.
    pub branch: Option<String>,
}

// ---------------------------------------------------------------------------
// Manga
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: DbId,
    pub title: String,
    pub url: String,
    pub public_url: String,
    pub cover_url: Option<String>,
    pub source: MangaSource,
    pub is_nsfw: bool,
    /// `None` when only the summary is known (e.g. loaded from the local
    /// catalogue rather than fetched from the source).
    pub chapters: Option<Vec<MangaChapter>>,
}

impl Manga {
    /// Chapters belonging to `branch`, in source order.
    ///
    /// Returns `None` when the chapter list itself is unknown.
    pub fn chapters_for_branch(&self, branch: Option<&str>) -> Option<Vec<&MangaChapter>> {
        let chapters = self.chapters.as_ref()?;
        Some(
            chapters
                .iter()
                .filter(|c| c.branch.as_deref() == branch)
                .collect(),
        )
    }

    /// The last chapter of the full (all branches) list.
    pub fn last_chapter(&self) -> Option<&MangaChapter> {
        self.chapters.as_ref()?.last()
    }

    /// Position of the chapter with `chapter_id` in the full list.
    pub fn chapter_index(&self, chapter_id: DbId) -> Option<usize> {
        self.chapters
            .as_ref()?
            .iter()
            .position(|c| c.id == chapter_id)
    }
}

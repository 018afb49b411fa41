//! Chapter-list comparison engine.
//!
//! [`compare`] decides which chapters of a freshly fetched manga are new
//! relative to its tracking cursor. The validity flag is asymmetric on
//! purpose: whenever the baseline chapter cannot be located the result is
//! marked invalid and reports nothing, so a source that reshuffles its list
//! never produces a burst of false notifications.

use crate::error::CheckError;
use crate::manga::Manga;
use crate::tracking::{MangaTracking, UpdateCheck};

/// Compare `manga` (fresh from the source) against `track`.
///
/// Only chapters of `branch` are considered. Returns
/// [`CheckError::MissingChapters`] if the fetched details carry no chapter
/// list at all.
pub fn compare(
    track: &MangaTracking,
    manga: Manga,
    branch: Option<&str>,
) -> Result<UpdateCheck, CheckError> {
    if track.is_empty() {
        // First check, or the manga had no chapters last time.
        return Ok(invalid(manga));
    }

    let new_chapters = {
        let chapters = manga
            .chapters_for_branch(branch)
            .ok_or(CheckError::MissingChapters)?;
        // Scan from the end: chapters are appended, so the baseline is
        // usually near the tail.
        let known_at = chapters
            .iter()
            .rposition(|c| c.id == track.last_chapter_id);
        let suffix = known_at.map(|i| {
            chapters[i + 1..]
                .iter()
                .map(|c| (*c).clone())
                .collect::<Vec<_>>()
        });
        suffix
    };

    let Some(new_chapters) = new_chapters else {
        // Baseline vanished (or the list is empty): nothing can be claimed.
        return Ok(invalid(manga));
    };

    Ok(UpdateCheck {
        manga,
        new_chapters,
        is_valid: true,
        channel_id: None,
    })
}

fn invalid(manga: Manga) -> UpdateCheck {
    UpdateCheck {
        manga,
        new_chapters: Vec::new(),
        is_valid: false,
        channel_id: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

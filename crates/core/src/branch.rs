//! Preferred-branch selection.
//!
//! Multi-branch manga (several translations in one chapter list) are
//! compared on a single branch: the one the user is reading, or failing
//! that the most complete one.

use std::collections::HashMap;

use crate::manga::Manga;
use crate::types::DbId;

/// Pick the branch to track for `manga`.
///
/// `history_chapter_id` is the chapter the user last read, if any. Returns
/// `None` for an unknown or empty chapter list and for single-branch manga
/// whose chapters carry no branch.
pub fn preferred_branch(manga: &Manga, history_chapter_id: Option<DbId>) -> Option<String> {
    let chapters = manga.chapters.as_deref()?;
    if chapters.is_empty() {
        return None;
    }

    if let Some(chapter_id) = history_chapter_id {
        if let Some(chapter) = chapters.iter().find(|c| c.id == chapter_id) {
            return chapter.branch.clone();
        }
    }

    // Most chapters wins; ties go to the branch seen first.
    let mut counts: HashMap<Option<&str>, (usize, usize)> = HashMap::new();
    for (index, chapter) in chapters.iter().enumerate() {
        let entry = counts.entry(chapter.branch.as_deref()).or_insert((0, index));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .and_then(|(branch, _)| branch.map(str::to_string))
}

//! Apiary notes and the one-way migration from the legacy single-string note.

use std::cmp::Ordering;

use crate::error::{ApiaryError, Result};
use crate::repository::Repository;
use crate::schema::ApiaryNote;
use crate::store::KeyValueStore;

/// Load structured notes for `apiary`, migrating the legacy note on first access.
///
/// Once a structured list exists it is authoritative and the legacy key is never read
/// again. The migrated list is persisted even when empty so migration runs at most once.
///
/// # Errors
/// Returns an error when either note record cannot be read or the migrated list cannot
/// be written.
pub fn load<S: KeyValueStore>(repo: &mut Repository<S>, apiary: &str) -> Result<Vec<ApiaryNote>> {
    if let Some(notes) = repo.notes(apiary)? {
        return Ok(notes);
    }

    let legacy = repo.legacy_note(apiary)?.unwrap_or_default();
    let notes = split_legacy_note(&legacy);
    tracing::debug!(apiary, migrated = notes.len(), "migrated legacy apiary note");
    repo.save_notes(apiary, &notes)?;
    Ok(notes)
}

#[must_use]
pub fn split_legacy_note(legacy: &str) -> Vec<ApiaryNote> {
    legacy
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ApiaryNote::undated)
        .collect()
}

/// Append a note; returns the updated list.
///
/// # Errors
/// Returns [`ApiaryError::EmptyNote`] when `text` is blank, or a storage error.
pub fn add<S: KeyValueStore>(
    repo: &mut Repository<S>,
    apiary: &str,
    text: &str,
    date: &str,
) -> Result<Vec<ApiaryNote>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiaryError::EmptyNote);
    }

    let mut notes = load(repo, apiary)?;
    notes.push(ApiaryNote { text: text.to_string(), date: date.trim().to_string() });
    repo.save_notes(apiary, &notes)?;
    Ok(notes)
}

/// Remove the note at `display_index` in [`display_order`]; the remaining notes are
/// persisted in display order.
///
/// # Errors
/// Returns [`ApiaryError::IndexOutOfRange`] for an invalid index, or a storage error.
pub fn remove<S: KeyValueStore>(
    repo: &mut Repository<S>,
    apiary: &str,
    display_index: usize,
) -> Result<ApiaryNote> {
    let mut notes = display_order(load(repo, apiary)?);
    if display_index >= notes.len() {
        return Err(ApiaryError::IndexOutOfRange { index: display_index, len: notes.len() });
    }
    let removed = notes.remove(display_index);
    repo.save_notes(apiary, &notes)?;
    Ok(removed)
}

/// Dated notes newest first, undated notes last, insertion order otherwise.
#[must_use]
pub fn display_order(mut notes: Vec<ApiaryNote>) -> Vec<ApiaryNote> {
    notes.sort_by(|lhs, rhs| match (lhs.date.is_empty(), rhs.date.is_empty()) {
        (false, false) => rhs.date.cmp(&lhs.date),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    });
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn note(text: &str, date: &str) -> ApiaryNote {
        ApiaryNote { text: text.to_string(), date: date.to_string() }
    }

    #[test]
    fn legacy_note_is_split_into_undated_lines() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_legacy_note("Home", "  check stand \n\n\r\nswap super\n   ")?;

        let notes = load(&mut repo, "Home")?;
        assert_eq!(notes, vec![ApiaryNote::undated("check stand"), ApiaryNote::undated("swap super")]);
        assert_eq!(repo.notes("Home")?, Some(notes));
        Ok(())
    }

    #[test]
    fn migration_runs_once_even_for_empty_result() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        assert!(load(&mut repo, "Home")?.is_empty());
        assert_eq!(repo.notes("Home")?, Some(Vec::new()));

        repo.save_legacy_note("Home", "written after migration")?;
        assert!(load(&mut repo, "Home")?.is_empty());
        Ok(())
    }

    #[test]
    fn migration_is_idempotent_and_never_resplits() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_legacy_note("Home", "a\nb")?;
        let first = load(&mut repo, "Home")?;
        let second = load(&mut repo, "Home")?;
        assert_eq!(first, second);

        repo.save_notes("Home", &[note("multi\nline", "")])?;
        assert_eq!(load(&mut repo, "Home")?, vec![note("multi\nline", "")]);
        Ok(())
    }

    #[test]
    fn add_rejects_blank_text() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        assert_eq!(add(&mut repo, "Home", "   ", ""), Err(ApiaryError::EmptyNote));
        let notes = add(&mut repo, "Home", " feed syrup ", "2024-05-01")?;
        assert_eq!(notes, vec![note("feed syrup", "2024-05-01")]);
        Ok(())
    }

    #[test]
    fn display_order_puts_newest_first_and_undated_last() {
        let ordered = display_order(vec![
            note("undated a", ""),
            note("old", "2023-01-01"),
            note("undated b", ""),
            note("new", "2024-06-01"),
        ]);
        let texts: Vec<&str> = ordered.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["new", "old", "undated a", "undated b"]);
    }

    #[test]
    fn remove_uses_display_index() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_notes("Home", &[note("undated", ""), note("dated", "2024-01-01")])?;

        let removed = remove(&mut repo, "Home", 0)?;
        assert_eq!(removed.text, "dated");
        assert_eq!(repo.notes("Home")?, Some(vec![note("undated", "")]));

        assert_eq!(
            remove(&mut repo, "Home", 3),
            Err(ApiaryError::IndexOutOfRange { index: 3, len: 1 })
        );
        Ok(())
    }
}

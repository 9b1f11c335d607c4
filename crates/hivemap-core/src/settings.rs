//! Global queen status and hive type settings.

use crate::error::{ApiaryError, Result};
use crate::repository::Repository;
use crate::schema::QueenStatus;
use crate::store::KeyValueStore;

pub const FALLBACK_STATUS_COLOR: &str = "#fff";
pub const UNNAMED_STATUS: &str = "(Unnamed)";

/// Display colour for a queen status string.
///
/// The first configured status whose name is a case-insensitive substring of `status`
/// wins; statuses with an empty name never match.
#[must_use]
pub fn color_for<'a>(statuses: &'a [QueenStatus], status: &str) -> &'a str {
    let needle = status.to_lowercase();
    statuses
        .iter()
        .find(|candidate| {
            !candidate.name.is_empty() && needle.contains(&candidate.name.to_lowercase())
        })
        .map_or(FALLBACK_STATUS_COLOR, |candidate| candidate.color.as_str())
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(ApiaryError::IndexOutOfRange { index, len });
    }
    Ok(())
}

/// Append a queen status. A blank name leaves the list unchanged.
///
/// # Errors
/// Returns an error when the settings cannot be read or written.
pub fn add_queen_status<S: KeyValueStore>(
    repo: &mut Repository<S>,
    name: &str,
    color: &str,
) -> Result<Vec<QueenStatus>> {
    let mut statuses = repo.queen_statuses()?;
    let name = name.trim();
    if name.is_empty() {
        return Ok(statuses);
    }
    statuses.push(QueenStatus::new(name, color));
    repo.save_queen_statuses(&statuses)?;
    Ok(statuses)
}

/// # Errors
/// Returns [`ApiaryError::IndexOutOfRange`] for an invalid index, or a storage error.
pub fn rename_queen_status<S: KeyValueStore>(
    repo: &mut Repository<S>,
    index: usize,
    name: &str,
) -> Result<Vec<QueenStatus>> {
    let mut statuses = repo.queen_statuses()?;
    check_index(index, statuses.len())?;
    let name = name.trim();
    statuses[index].name = if name.is_empty() { UNNAMED_STATUS.to_string() } else { name.to_string() };
    repo.save_queen_statuses(&statuses)?;
    Ok(statuses)
}

/// # Errors
/// Returns [`ApiaryError::IndexOutOfRange`] for an invalid index, or a storage error.
pub fn recolor_queen_status<S: KeyValueStore>(
    repo: &mut Repository<S>,
    index: usize,
    color: &str,
) -> Result<Vec<QueenStatus>> {
    let mut statuses = repo.queen_statuses()?;
    check_index(index, statuses.len())?;
    statuses[index].color = color.to_string();
    repo.save_queen_statuses(&statuses)?;
    Ok(statuses)
}

/// # Errors
/// Returns [`ApiaryError::IndexOutOfRange`] for an invalid index, or a storage error.
pub fn remove_queen_status<S: KeyValueStore>(
    repo: &mut Repository<S>,
    index: usize,
) -> Result<QueenStatus> {
    let mut statuses = repo.queen_statuses()?;
    check_index(index, statuses.len())?;
    let removed = statuses.remove(index);
    repo.save_queen_statuses(&statuses)?;
    Ok(removed)
}

/// Append a hive type. Blank names are ignored; duplicates are kept.
///
/// # Errors
/// Returns an error when the settings cannot be read or written.
pub fn add_hive_type<S: KeyValueStore>(repo: &mut Repository<S>, name: &str) -> Result<Vec<String>> {
    let mut types = repo.hive_types()?;
    if name.trim().is_empty() {
        return Ok(types);
    }
    types.push(name.to_string());
    repo.save_hive_types(&types)?;
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::default_queen_statuses;
    use crate::store::MemoryStore;

    #[test]
    fn unknown_status_falls_back_to_white() {
        assert_eq!(color_for(&default_queen_statuses(), "unknown-status-xyz"), "#fff");
        assert_eq!(color_for(&[], "Marked"), "#fff");
    }

    #[test]
    fn match_is_case_insensitive_substring_in_configured_order() {
        let statuses = default_queen_statuses();
        assert_eq!(color_for(&statuses, "queen MARKED blue"), "#bdf");
        // "Unmarked" contains "marked", and "Marked" is configured first.
        assert_eq!(color_for(&statuses, "Unmarked"), "#bdf");
        assert_eq!(color_for(&statuses, "missing?"), "#fbb");
    }

    #[test]
    fn empty_status_names_never_match() {
        let statuses = vec![QueenStatus::new("", "#000"), QueenStatus::new("Query", "#f00")];
        assert_eq!(color_for(&statuses, "anything"), "#fff");
        assert_eq!(color_for(&statuses, "query - no eggs"), "#f00");
    }

    #[test]
    fn status_edits_persist_through_the_repository() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        add_queen_status(&mut repo, "  ", "#000")?;
        assert_eq!(repo.queen_statuses()?.len(), 4);

        add_queen_status(&mut repo, " Query ", "#f0f")?;
        rename_queen_status(&mut repo, 0, "   ")?;
        recolor_queen_status(&mut repo, 1, "#123")?;
        let removed = remove_queen_status(&mut repo, 2)?;

        let statuses = repo.queen_statuses()?;
        assert_eq!(removed.name, "Missing");
        assert_eq!(statuses[0].name, UNNAMED_STATUS);
        assert_eq!(statuses[1].color, "#123");
        assert_eq!(statuses.last(), Some(&QueenStatus::new("Query", "#f0f")));
        assert_eq!(
            remove_queen_status(&mut repo, 9),
            Err(ApiaryError::IndexOutOfRange { index: 9, len: 4 })
        );
        Ok(())
    }

    #[test]
    fn hive_types_keep_duplicates_and_skip_blanks() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        add_hive_type(&mut repo, "National")?;
        add_hive_type(&mut repo, "National")?;
        add_hive_type(&mut repo, " ")?;
        assert_eq!(repo.hive_types()?, vec!["N/A", "National", "National"]);
        Ok(())
    }
}

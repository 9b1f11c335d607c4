//! Apiary lifecycle: create, switch, rename and delete, cascading to the per-apiary
//! layout and note records.
//!
//! Every operation validates before its first write, so a rejected call leaves the
//! store untouched.

use crate::error::{ApiaryError, Result};
use crate::repository::Repository;
use crate::schema::LayoutDocument;
use crate::store::KeyValueStore;

fn require_listed(apiaries: &[String], name: &str) -> Result<usize> {
    apiaries
        .iter()
        .position(|candidate| candidate == name)
        .ok_or_else(|| ApiaryError::ApiaryNotFound(name.to_string()))
}

/// Create an apiary with an empty layout and note list, and make it current.
///
/// # Errors
/// Returns [`ApiaryError::DuplicateName`] when `name` is blank or already listed, or a
/// storage error.
pub fn create<S: KeyValueStore>(repo: &mut Repository<S>, name: &str) -> Result<String> {
    let name = name.trim();
    let mut apiaries = repo.apiaries()?;
    if name.is_empty() || apiaries.iter().any(|existing| existing == name) {
        return Err(ApiaryError::DuplicateName(name.to_string()));
    }

    apiaries.push(name.to_string());
    repo.save_apiaries(&apiaries)?;
    repo.save_current_apiary(name)?;
    repo.save_layout(name, &LayoutDocument::empty())?;
    repo.save_notes(name, &[])?;
    tracing::info!(apiary = name, "created apiary");
    Ok(name.to_string())
}

/// Make `name` the current apiary.
///
/// When `active_layout` is supplied it is persisted under the previous current apiary
/// before the pointer moves. A blank `name` is a no-op.
///
/// # Errors
/// Returns [`ApiaryError::ApiaryNotFound`] when `name` is not listed, or a storage error.
pub fn switch<S: KeyValueStore>(
    repo: &mut Repository<S>,
    name: &str,
    active_layout: Option<&LayoutDocument>,
) -> Result<()> {
    if name.is_empty() {
        tracing::debug!("ignored switch to blank apiary name");
        return Ok(());
    }
    require_listed(&repo.apiaries()?, name)?;

    if let (Some(previous), Some(layout)) = (repo.current_apiary()?, active_layout) {
        repo.save_layout(&previous, layout)?;
    }
    repo.save_current_apiary(name)?;
    tracing::info!(apiary = name, "switched apiary");
    Ok(())
}

/// Rename `old` to `new`, moving its layout and notes and keeping its list position.
///
/// Renaming to the same name or to a blank name is a no-op.
///
/// # Errors
/// Returns [`ApiaryError::ApiaryNotFound`] when `old` is not listed,
/// [`ApiaryError::DuplicateName`] when `new` already exists, or a storage error.
pub fn rename<S: KeyValueStore>(repo: &mut Repository<S>, old: &str, new: &str) -> Result<()> {
    let new = new.trim();
    if new.is_empty() || new == old {
        tracing::debug!(apiary = old, "ignored no-op apiary rename");
        return Ok(());
    }

    let mut apiaries = repo.apiaries()?;
    let index = require_listed(&apiaries, old)?;
    if apiaries.iter().any(|existing| existing == new) {
        return Err(ApiaryError::DuplicateName(new.to_string()));
    }

    repo.move_apiary_records(old, new)?;
    apiaries[index] = new.to_string();
    repo.save_apiaries(&apiaries)?;
    if repo.current_apiary()?.as_deref() == Some(old) {
        repo.save_current_apiary(new)?;
    }
    tracing::info!(from = old, to = new, "renamed apiary");
    Ok(())
}

/// Delete an apiary and its records. Returns the current apiary afterwards.
///
/// When the deleted apiary was current, the first remaining apiary in list order
/// becomes current.
///
/// # Errors
/// Returns [`ApiaryError::ApiaryNotFound`] when `name` is not listed,
/// [`ApiaryError::LastApiary`] when it is the only apiary, or a storage error.
pub fn delete<S: KeyValueStore>(repo: &mut Repository<S>, name: &str) -> Result<Option<String>> {
    let mut apiaries = repo.apiaries()?;
    let index = require_listed(&apiaries, name)?;
    if apiaries.len() == 1 {
        return Err(ApiaryError::LastApiary(name.to_string()));
    }

    repo.delete_apiary_records(name)?;
    apiaries.remove(index);
    repo.save_apiaries(&apiaries)?;

    let mut current = repo.current_apiary()?;
    if current.is_none() || current.as_deref() == Some(name) {
        current = apiaries.first().cloned();
        if let Some(next) = &current {
            repo.save_current_apiary(next)?;
        }
    }
    tracing::info!(apiary = name, current = current.as_deref().unwrap_or_default(), "deleted apiary");
    Ok(current)
}

/// The current apiary's name and layout. An apiary with no stored layout yields an
/// empty one.
///
/// # Errors
/// Returns [`ApiaryError::NoApiaries`] when no apiary is current, or a read error.
pub fn current_layout<S: KeyValueStore>(repo: &Repository<S>) -> Result<(String, LayoutDocument)> {
    let apiary = repo.current_apiary()?.ok_or(ApiaryError::NoApiaries)?;
    let layout = repo.layout(&apiary)?.unwrap_or_default();
    Ok((apiary, layout))
}

/// # Errors
/// Returns [`ApiaryError::NoApiaries`] when no apiary is current, or a storage error.
pub fn save_current_layout<S: KeyValueStore>(
    repo: &mut Repository<S>,
    layout: &LayoutDocument,
) -> Result<String> {
    let apiary = repo.current_apiary()?.ok_or(ApiaryError::NoApiaries)?;
    repo.save_layout(&apiary, layout)?;
    Ok(apiary)
}

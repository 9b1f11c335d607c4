//! Hive record operations over a decoded layout.
//!
//! These functions mutate in-memory records only; callers write the layout back
//! through the repository (see [`crate::apiary::save_current_layout`]).

use serde_json::Value;

use crate::error::{ApiaryError, Result};
use crate::schema::{
    Geometry, HiveBox, HiveRecord, HiveStatus, Inspection, LayoutDocument, LayoutObject,
    QueenStatus, UNNAMED_HIVE,
};
use crate::settings::color_for;

pub const DEFAULT_HIVE_SIZE: f64 = 40.0;
pub const NEW_HIVE_NAME: &str = "Hive";
const NEW_HIVE_ORIGIN: f64 = 100.0;

/// Values submitted from the hive edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiveEditForm {
    pub name: String,
    pub hive_type: String,
    pub next_inspection_date: String,
    pub inspection: Inspection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiveEditOutcome {
    /// Whether the submitted inspection differed from the latest and was appended.
    pub appended: bool,
    /// Display colour derived from the latest queen status.
    pub color: String,
}

fn edited_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        UNNAMED_HIVE.to_string()
    } else {
        name.to_string()
    }
}

fn usable_size(size: f64) -> f64 {
    if size.is_finite() && size > 0.0 {
        size
    } else {
        DEFAULT_HIVE_SIZE
    }
}

impl HiveRecord {
    /// Append `inspection` unless it equals the latest one. Returns whether it was appended.
    pub fn record_inspection(&mut self, inspection: Inspection) -> bool {
        if self.latest_inspection() == Some(&inspection) {
            return false;
        }
        self.inspections.push(inspection);
        true
    }

    /// Overwrite identity fields and record the submitted inspection.
    pub fn apply_edit(&mut self, form: &HiveEditForm) -> bool {
        self.name = edited_name(&form.name);
        self.hive_type.clone_from(&form.hive_type);
        self.next_inspection_date.clone_from(&form.next_inspection_date);
        self.record_inspection(form.inspection.clone())
    }

    /// # Errors
    /// Returns [`ApiaryError::IndexOutOfRange`] when `index` is not a valid position.
    pub fn delete_inspection(&mut self, index: usize) -> Result<Inspection> {
        if index >= self.inspections.len() {
            return Err(ApiaryError::IndexOutOfRange { index, len: self.inspections.len() });
        }
        Ok(self.inspections.remove(index))
    }

    /// Append a box entry. Entries of the same type are not merged.
    ///
    /// # Errors
    /// Returns [`ApiaryError::InvalidCount`] when `count` is below one.
    pub fn add_box(&mut self, box_type: &str, count: i64) -> Result<()> {
        let count = u32::try_from(count)
            .ok()
            .filter(|count| *count >= 1)
            .ok_or(ApiaryError::InvalidCount(count))?;
        self.boxes.push(HiveBox { box_type: box_type.to_string(), count });
        Ok(())
    }

    /// # Errors
    /// Returns [`ApiaryError::IndexOutOfRange`] when `index` is not a valid position.
    pub fn remove_box(&mut self, index: usize) -> Result<HiveBox> {
        if index >= self.boxes.len() {
            return Err(ApiaryError::IndexOutOfRange { index, len: self.boxes.len() });
        }
        Ok(self.boxes.remove(index))
    }

    pub fn archive(&mut self) {
        self.status = HiveStatus::Archived;
    }

    pub fn restore(&mut self) {
        self.status = HiveStatus::Active;
    }
}

impl LayoutDocument {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn hives(&self) -> impl Iterator<Item = &HiveRecord> {
        self.objects.iter().filter_map(|object| object.hive_data.as_ref())
    }

    /// Trimmed names of every hive, archived ones included.
    #[must_use]
    pub fn hive_names(&self) -> Vec<String> {
        self.hives().map(|hive| hive.name.trim().to_string()).collect()
    }

    fn visible_name_taken(&self, name: &str, skip: Option<usize>) -> bool {
        self.objects.iter().enumerate().any(|(position, object)| {
            Some(position) != skip
                && object
                    .hive_data
                    .as_ref()
                    .is_some_and(|hive| !hive.is_archived() && hive.name.trim() == name)
        })
    }

    /// Object index of the hive called `name`, preferring a visible hive over an
    /// archived one with the same name.
    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        let matches = |archived: bool| {
            self.objects.iter().position(|object| {
                object
                    .hive_data
                    .as_ref()
                    .is_some_and(|hive| hive.is_archived() == archived && hive.name.trim() == name)
            })
        };
        matches(false).or_else(|| matches(true))
    }

    #[must_use]
    pub fn find_hive(&self, name: &str) -> Option<&HiveRecord> {
        self.position(name).and_then(|position| self.objects[position].hive_data.as_ref())
    }

    /// # Errors
    /// Returns [`ApiaryError::HiveNotFound`] when no hive has that name.
    pub fn find_hive_mut(&mut self, name: &str) -> Result<&mut HiveRecord> {
        self.position(name)
            .and_then(|position| self.objects[position].hive_data.as_mut())
            .ok_or_else(|| ApiaryError::HiveNotFound(name.to_string()))
    }

    /// Place a new active hive with a seed group geometry. A blank name becomes
    /// [`NEW_HIVE_NAME`]; a non-positive size falls back to [`DEFAULT_HIVE_SIZE`].
    ///
    /// # Errors
    /// Returns [`ApiaryError::DuplicateHiveName`] when a visible hive already uses the name.
    pub fn create_hive(&mut self, name: &str, width: f64, height: f64) -> Result<&HiveRecord> {
        let name = match name.trim() {
            "" => NEW_HIVE_NAME,
            trimmed => trimmed,
        };
        if self.visible_name_taken(name, None) {
            return Err(ApiaryError::DuplicateHiveName(name.to_string()));
        }

        let mut geometry = Geometry::new();
        geometry.insert("type".to_string(), Value::from("group"));
        geometry.insert("left".to_string(), Value::from(NEW_HIVE_ORIGIN));
        geometry.insert("top".to_string(), Value::from(NEW_HIVE_ORIGIN));
        geometry.insert("width".to_string(), Value::from(usable_size(width)));
        geometry.insert("height".to_string(), Value::from(usable_size(height)));

        self.objects.push(LayoutObject { geometry, hive_data: Some(HiveRecord::new(name)) });
        tracing::debug!(hive = name, "placed hive");
        self.hives().last().ok_or_else(|| ApiaryError::HiveNotFound(name.to_string()))
    }

    /// Apply the edit form to the hive called `name`.
    ///
    /// # Errors
    /// Returns [`ApiaryError::HiveNotFound`] for an unknown hive, or
    /// [`ApiaryError::DuplicateHiveName`] when the new name belongs to another visible hive.
    pub fn save_hive_edit(
        &mut self,
        name: &str,
        form: &HiveEditForm,
        statuses: &[QueenStatus],
    ) -> Result<HiveEditOutcome> {
        let position = self.position(name).ok_or_else(|| ApiaryError::HiveNotFound(name.to_string()))?;
        let new_name = edited_name(&form.name);
        if self.visible_name_taken(&new_name, Some(position)) {
            return Err(ApiaryError::DuplicateHiveName(new_name));
        }

        let hive = self.objects[position]
            .hive_data
            .as_mut()
            .ok_or_else(|| ApiaryError::HiveNotFound(name.to_string()))?;
        let appended = hive.apply_edit(form);
        let color = color_for(statuses, hive.effective_queen_status()).to_string();
        Ok(HiveEditOutcome { appended, color })
    }

    /// Delete the hive's object from the layout.
    ///
    /// # Errors
    /// Returns [`ApiaryError::HiveNotFound`] when no hive has that name.
    pub fn remove_hive(&mut self, name: &str) -> Result<HiveRecord> {
        let position = self.position(name).ok_or_else(|| ApiaryError::HiveNotFound(name.to_string()))?;
        self.objects
            .remove(position)
            .hive_data
            .ok_or_else(|| ApiaryError::HiveNotFound(name.to_string()))
    }

    #[must_use]
    pub fn archived_hives(&self) -> Vec<&HiveRecord> {
        self.hives().filter(|hive| hive.is_archived()).collect()
    }

    /// Smallest positive integer not already used as a hive name.
    #[must_use]
    pub fn suggest_hive_name(&self) -> String {
        let used = self.hive_names();
        (1_u64..)
            .map(|candidate| candidate.to_string())
            .find(|candidate| !used.contains(candidate))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::schema::default_queen_statuses;

    fn inspection(date: &str, status: &str, notes: &str) -> Inspection {
        Inspection {
            date: date.to_string(),
            queen_status: status.to_string(),
            notes: notes.to_string(),
        }
    }

    fn form(name: &str, inspection: Inspection) -> HiveEditForm {
        HiveEditForm {
            name: name.to_string(),
            hive_type: "National".to_string(),
            next_inspection_date: "2024-06-01".to_string(),
            inspection,
        }
    }

    #[test]
    fn create_hive_seeds_active_record_and_geometry() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        let hive = layout.create_hive(" 1 ", 0.0, 60.0)?;
        assert_eq!(hive.name, "1");
        assert_eq!(hive.status, HiveStatus::Active);
        assert!(hive.boxes.is_empty() && hive.inspections.is_empty());

        let geometry = &layout.objects[0].geometry;
        assert_eq!(geometry.get("left"), Some(&Value::from(100.0)));
        assert_eq!(geometry.get("width"), Some(&Value::from(DEFAULT_HIVE_SIZE)));
        assert_eq!(geometry.get("height"), Some(&Value::from(60.0)));
        Ok(())
    }

    #[test]
    fn create_hive_rejects_visible_duplicates_only() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        layout.create_hive("1", 40.0, 40.0)?;
        assert_eq!(
            layout.create_hive("1", 40.0, 40.0).map(|_| ()),
            Err(ApiaryError::DuplicateHiveName("1".into()))
        );

        layout.find_hive_mut("1")?.archive();
        layout.create_hive("1", 40.0, 40.0)?;
        assert_eq!(layout.hive_names(), vec!["1", "1"]);
        assert_eq!(layout.find_hive("1").map(HiveRecord::is_archived), Some(false));
        Ok(())
    }

    #[test]
    fn blank_hive_name_uses_default() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        assert_eq!(layout.create_hive("  ", 40.0, 40.0)?.name, NEW_HIVE_NAME);
        Ok(())
    }

    #[test]
    fn unchanged_inspection_is_not_appended() {
        let mut hive = HiveRecord::new("1");
        let entry = inspection("2024-05-01", "Marked", "calm");
        assert!(hive.apply_edit(&form("1", entry.clone())));
        assert!(!hive.apply_edit(&form("1", entry.clone())));
        assert_eq!(hive.inspections.len(), 1);

        assert!(hive.apply_edit(&form("1", inspection("2024-05-01", "Marked", "calmer"))));
        assert_eq!(hive.inspections.len(), 2);
    }

    #[test]
    fn first_save_always_appends_even_when_blank() {
        let mut hive = HiveRecord::new("1");
        assert!(hive.apply_edit(&form("", Inspection::default())));
        assert_eq!(hive.name, UNNAMED_HIVE);
        assert_eq!(hive.inspections.len(), 1);
    }

    #[test]
    fn save_hive_edit_recolors_and_checks_rename_collisions() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        layout.create_hive("1", 40.0, 40.0)?;
        layout.create_hive("2", 40.0, 40.0)?;
        let statuses = default_queen_statuses();

        let outcome =
            layout.save_hive_edit("1", &form("1", inspection("2024-05-01", "Missing queen", "")), &statuses)?;
        assert_eq!(outcome, HiveEditOutcome { appended: true, color: "#fbb".to_string() });

        assert_eq!(
            layout.save_hive_edit("1", &form("2", Inspection::default()), &statuses),
            Err(ApiaryError::DuplicateHiveName("2".into()))
        );
        assert_eq!(
            layout.save_hive_edit("9", &form("9", Inspection::default()), &statuses),
            Err(ApiaryError::HiveNotFound("9".into()))
        );

        let renamed =
            layout.save_hive_edit("1", &form("1b", inspection("2024-05-01", "Missing queen", "")), &statuses)?;
        assert!(!renamed.appended);
        assert_eq!(layout.hive_names(), vec!["1b", "2"]);
        Ok(())
    }

    #[test]
    fn delete_inspection_preserves_order() -> Result<()> {
        let mut hive = HiveRecord::new("1");
        for date in ["2024-01-01", "2024-02-01", "2024-03-01"] {
            hive.record_inspection(inspection(date, "", ""));
        }
        let removed = hive.delete_inspection(1)?;
        assert_eq!(removed.date, "2024-02-01");
        let dates: Vec<&str> = hive.inspections.iter().map(|i| i.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-03-01"]);
        assert_eq!(hive.delete_inspection(2), Err(ApiaryError::IndexOutOfRange { index: 2, len: 2 }));
        Ok(())
    }

    #[test]
    fn boxes_validate_count_and_keep_duplicates() -> Result<()> {
        let mut hive = HiveRecord::new("1");
        assert_eq!(hive.add_box("Standard Deep 11", 0), Err(ApiaryError::InvalidCount(0)));
        assert_eq!(hive.add_box("Standard Deep 11", -3), Err(ApiaryError::InvalidCount(-3)));
        hive.add_box("Standard Deep 11", 1)?;
        hive.add_box("Standard Deep 11", 2)?;
        assert_eq!(hive.boxes.len(), 2);

        let removed = hive.remove_box(0)?;
        assert_eq!(removed.count, 1);
        assert_eq!(hive.remove_box(5), Err(ApiaryError::IndexOutOfRange { index: 5, len: 1 }));
        Ok(())
    }

    #[test]
    fn archive_and_restore_toggle_status() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        layout.create_hive("1", 40.0, 40.0)?;
        layout.create_hive("2", 40.0, 40.0)?;
        layout.find_hive_mut("2")?.archive();
        let archived: Vec<&str> = layout.archived_hives().into_iter().map(|h| h.name.as_str()).collect();
        assert_eq!(archived, vec!["2"]);

        layout.find_hive_mut("2")?.restore();
        assert!(layout.archived_hives().is_empty());
        Ok(())
    }

    #[test]
    fn suggested_name_is_smallest_unused_number() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        assert_eq!(layout.suggest_hive_name(), "1");
        for name in ["1", "2", "4", "Queen bank"] {
            layout.create_hive(name, 40.0, 40.0)?;
        }
        assert_eq!(layout.suggest_hive_name(), "3");
        Ok(())
    }

    #[test]
    fn remove_hive_drops_the_object() -> Result<()> {
        let mut layout = LayoutDocument::empty();
        layout.create_hive("1", 40.0, 40.0)?;
        assert_eq!(layout.remove_hive("1")?.name, "1");
        assert!(layout.objects.is_empty());
        assert_eq!(layout.remove_hive("1"), Err(ApiaryError::HiveNotFound("1".into())));
        Ok(())
    }

    proptest! {
        #[test]
        fn property_repeated_identical_saves_never_grow_history(
            date in "[0-9-]{0,10}",
            status in ".{0,12}",
            notes in ".{0,24}",
            repeats in 1_usize..6,
        ) {
            let mut hive = HiveRecord::new("1");
            let submitted = inspection(&date, &status, &notes);
            hive.apply_edit(&form("1", submitted.clone()));
            let before = hive.inspections.len();
            for _ in 0..repeats {
                prop_assert!(!hive.apply_edit(&form("1", submitted.clone())));
            }
            prop_assert_eq!(hive.inspections.len(), before);
            prop_assert_eq!(hive.latest_inspection(), Some(&submitted));
        }
    }
}

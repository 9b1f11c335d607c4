//! Due-inspection query engine.
//!
//! A read-only scan over every persisted layout. Dates are ISO `YYYY-MM-DD` strings,
//! which compare correctly as text.

use std::cmp::Ordering;

use serde::Serialize;
use time::macros::format_description;
use time::{Date, Duration};

use crate::error::{ApiaryError, Result};
use crate::repository::Repository;
use crate::store::KeyValueStore;

pub const DUE_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DueInspection {
    pub apiary_name: String,
    pub hive_name: String,
    pub due_date: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Overdue,
    Today,
    Upcoming,
}

impl Urgency {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Today => "today",
            Self::Upcoming => "upcoming",
        }
    }
}

impl DueInspection {
    #[must_use]
    pub fn urgency(&self, today: Date) -> Urgency {
        match self.due_date.as_str().cmp(iso_date(today).as_str()) {
            Ordering::Less => Urgency::Overdue,
            Ordering::Equal => Urgency::Today,
            Ordering::Greater => Urgency::Upcoming,
        }
    }
}

#[must_use]
pub fn iso_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// # Errors
/// Returns [`ApiaryError::InvalidFormat`] when `value` is not a `YYYY-MM-DD` date.
pub fn parse_iso_date(value: &str) -> Result<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|err| ApiaryError::InvalidFormat(format!("invalid date {value:?}: {err}")))
}

/// Hive names that both parse as integers compare numerically and two other names
/// compare as text. Numeric names rank ahead of the rest so the order stays total.
fn compare_hive_names(lhs: &str, rhs: &str) -> Ordering {
    match (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        (Ok(left), Ok(right)) => left.cmp(&right).then_with(|| lhs.cmp(rhs)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => lhs.cmp(rhs),
    }
}

fn compare(lhs: &DueInspection, rhs: &DueInspection) -> Ordering {
    lhs.apiary_name
        .cmp(&rhs.apiary_name)
        .then_with(|| lhs.due_date.cmp(&rhs.due_date))
        .then_with(|| compare_hive_names(&lhs.hive_name, &rhs.hive_name))
}

pub fn sort_due(entries: &mut [DueInspection]) {
    entries.sort_by(compare);
}

/// Every hive with a next-inspection date, across all apiaries, in due order.
///
/// Archived hives are included. Layout objects that fail to decode are logged and
/// skipped, and so is an apiary whose layout is not a JSON object.
///
/// # Errors
/// Returns an error only when the apiary list itself cannot be read.
pub fn due_inspections<S: KeyValueStore>(repo: &Repository<S>) -> Result<Vec<DueInspection>> {
    let mut entries = Vec::new();
    for apiary in repo.apiaries()? {
        let layout = match repo.scan_layout(&apiary) {
            Ok(Some(layout)) => layout,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(apiary = %apiary, error = %err, "skipping apiary in due scan");
                continue;
            }
        };
        entries.extend(layout.hives().filter(|hive| !hive.next_inspection_date.is_empty()).map(
            |hive| DueInspection {
                apiary_name: apiary.clone(),
                hive_name: hive.display_name().to_string(),
                due_date: hive.next_inspection_date.clone(),
            },
        ));
    }
    sort_due(&mut entries);
    Ok(entries)
}

/// Keep entries that are overdue, due today, or due within [`DUE_WINDOW_DAYS`].
#[must_use]
pub fn within_window(entries: &[DueInspection], today: Date) -> Vec<DueInspection> {
    let horizon = iso_date(today.checked_add(Duration::days(DUE_WINDOW_DAYS)).unwrap_or(Date::MAX));
    entries.iter().filter(|entry| entry.due_date <= horizon).cloned().collect()
}

/// Number of entries overdue or due today.
#[must_use]
pub fn due_now(entries: &[DueInspection], today: Date) -> usize {
    entries.iter().filter(|entry| entry.urgency(today) != Urgency::Upcoming).count()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::macros::date;

    use super::*;
    use crate::schema::{HiveRecord, LayoutDocument, LayoutObject};
    use crate::store::MemoryStore;

    fn entry(apiary: &str, hive: &str, due: &str) -> DueInspection {
        DueInspection {
            apiary_name: apiary.to_string(),
            hive_name: hive.to_string(),
            due_date: due.to_string(),
        }
    }

    fn layout_with(hives: &[(&str, &str)]) -> LayoutDocument {
        let mut layout = LayoutDocument::empty();
        for (name, due) in hives {
            let mut hive = HiveRecord::new(*name);
            hive.next_inspection_date = (*due).to_string();
            layout.objects.push(LayoutObject { hive_data: Some(hive), ..LayoutObject::default() });
        }
        layout
    }

    #[test]
    fn orders_by_apiary_then_date_then_numeric_hive_name() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_apiaries(&["B".to_string(), "A".to_string()])?;
        repo.save_layout("B", &layout_with(&[("2", "2024-01-05")]))?;
        repo.save_layout("A", &layout_with(&[("10", "2024-01-05"), ("2", "2024-01-05")]))?;

        let due = due_inspections(&repo)?;
        assert_eq!(
            due,
            vec![
                entry("A", "2", "2024-01-05"),
                entry("A", "10", "2024-01-05"),
                entry("B", "2", "2024-01-05"),
            ]
        );
        Ok(())
    }

    #[test]
    fn hives_without_next_date_are_excluded_and_blank_names_shown_unnamed() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_apiaries(&["A".to_string()])?;
        repo.save_layout("A", &layout_with(&[("1", ""), ("", "2024-02-01")]))?;
        assert_eq!(due_inspections(&repo)?, vec![entry("A", "Unnamed", "2024-02-01")]);
        Ok(())
    }

    #[test]
    fn malformed_layout_is_skipped_not_fatal() -> Result<()> {
        let mut store = MemoryStore::new();
        store.set("allApiaries", r#"["Broken","Good"]"#)?;
        store.set("hiveLayout:Broken", "{oops")?;
        let mut repo = Repository::new(store);
        repo.save_layout("Good", &layout_with(&[("1", "2024-03-01")]))?;

        assert_eq!(due_inspections(&repo)?, vec![entry("Good", "1", "2024-03-01")]);
        Ok(())
    }

    #[test]
    fn loosely_typed_hive_does_not_hide_its_neighbours() -> Result<()> {
        let mut store = MemoryStore::new();
        store.set("allApiaries", r#"["Home"]"#)?;
        store.set(
            "hiveLayout:Home",
            r#"{"objects":[
                {"type":"group","hiveData":{"name":3,"nextInspectionDate":"2024-04-02","status":null}},
                {"type":"group","hiveData":{"name":"4","nextInspectionDate":"2024-04-01","status":"archived",
                    "inspections":[{"date":"2024-03-01","queenStatus":"Query"}]}},
                {"type":"group","hiveData":[1,2]}
            ]}"#,
        )?;
        let repo = Repository::new(store);

        assert_eq!(
            due_inspections(&repo)?,
            vec![entry("Home", "4", "2024-04-01"), entry("Home", "3", "2024-04-02")]
        );
        Ok(())
    }

    #[test]
    fn archived_hives_with_a_next_date_are_still_due() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_apiaries(&["A".to_string()])?;
        let mut layout = layout_with(&[("1", "2024-05-01"), ("2", "2024-05-02")]);
        if let Some(hive) = layout.objects[1].hive_data.as_mut() {
            hive.archive();
        }
        repo.save_layout("A", &layout)?;

        assert!(repo.layout("A")?.is_some_and(|stored| stored.archived_hives().len() == 1));
        assert_eq!(
            due_inspections(&repo)?,
            vec![entry("A", "1", "2024-05-01"), entry("A", "2", "2024-05-02")]
        );
        Ok(())
    }

    #[test]
    fn numeric_names_rank_before_text_names() {
        let mut entries = vec![
            entry("A", "b", "d"),
            entry("A", "1a", "d"),
            entry("A", "10", "d"),
            entry("A", "9", "d"),
            entry("A", "Bee", "d"),
        ];
        sort_due(&mut entries);
        let names: Vec<&str> = entries.iter().map(|e| e.hive_name.as_str()).collect();
        assert_eq!(names, vec!["9", "10", "1a", "Bee", "b"]);
    }

    #[test]
    fn window_keeps_overdue_and_next_seven_days() {
        let today = date!(2024 - 06 - 10);
        let entries = vec![
            entry("A", "1", "2024-05-01"),
            entry("A", "2", "2024-06-10"),
            entry("A", "3", "2024-06-17"),
            entry("A", "4", "2024-06-18"),
        ];
        let kept: Vec<String> =
            within_window(&entries, today).into_iter().map(|e| e.hive_name).collect();
        assert_eq!(kept, vec!["1", "2", "3"]);
        assert_eq!(due_now(&entries, today), 2);
    }

    #[test]
    fn urgency_compares_against_today() {
        let today = date!(2024 - 01 - 05);
        assert_eq!(entry("A", "1", "2024-01-04").urgency(today), Urgency::Overdue);
        assert_eq!(entry("A", "1", "2024-01-05").urgency(today), Urgency::Today);
        assert_eq!(entry("A", "1", "2024-01-06").urgency(today), Urgency::Upcoming);
    }

    #[test]
    fn iso_dates_round_trip() -> Result<()> {
        let parsed = parse_iso_date("2024-02-29")?;
        assert_eq!(iso_date(parsed), "2024-02-29");
        assert!(matches!(parse_iso_date("29/02/2024"), Err(ApiaryError::InvalidFormat(_))));
        Ok(())
    }

    proptest! {
        #[test]
        fn property_due_order_is_independent_of_input_order(
            raw in prop::collection::vec(("[AB]", "[0-9]{1,2}|[a-c1]{1,2}", "2024-0[1-2]-0[1-3]"), 0..24),
            seed in any::<u64>(),
        ) {
            let mut forward: Vec<DueInspection> =
                raw.iter().map(|(apiary, hive, due)| entry(apiary, hive, due)).collect();
            let mut shuffled = forward.clone();
            let len = shuffled.len();
            if len > 1 {
                let mut state = seed;
                for index in (1..len).rev() {
                    state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                    let pick = usize::try_from(state >> 33).unwrap_or(0) % (index + 1);
                    shuffled.swap(index, pick);
                }
            }
            sort_due(&mut forward);
            sort_due(&mut shuffled);
            prop_assert_eq!(forward, shuffled);
        }
    }
}

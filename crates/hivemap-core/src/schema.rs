//! Persisted record shapes.
//!
//! Field names follow the camelCase documents the layout editor writes, and every
//! type tolerates missing or `null` fields so that older layouts still decode.
//! Unknown keys are carried through `extra`/`geometry` maps untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_HIVE_TYPE: &str = "N/A";
pub const UNNAMED_HIVE: &str = "Unnamed";
pub const BOX_TYPES: [&str; 3] = ["Standard Deep 11", "Extra Deep 11", "Standard Shallow"];

/// Opaque per-object layout data owned by the rendering surface.
pub type Geometry = Map<String, Value>;

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text fields the editor may have written as numbers or booleans.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

/// Anything other than `"archived"` is an active hive.
fn lenient_status<'de, D>(deserializer: D) -> std::result::Result<HiveStatus, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(status) if status == HiveStatus::Archived.as_str() => {
            Ok(HiveStatus::Archived)
        }
        _ => Ok(HiveStatus::Active),
    }
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    Ok(count.and_then(|count| u32::try_from(count).ok()).unwrap_or_default())
}

/// Keeps the list entries that decode; a non-list reads as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items.into_iter().filter_map(|item| serde_json::from_value(item).ok()).collect())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HiveStatus {
    #[default]
    Active,
    Archived,
}

impl HiveStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub queen_status: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct HiveBox {
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub box_type: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HiveRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub hive_type: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: HiveStatus,
    #[serde(default, deserialize_with = "lenient_text")]
    pub next_inspection_date: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub boxes: Vec<HiveBox>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub inspections: Vec<Inspection>,
    /// Hive-level status written by early layouts, consulted only when no inspection exists.
    #[serde(default, deserialize_with = "lenient_optional_text", skip_serializing_if = "Option::is_none")]
    pub queen_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HiveRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hive_type: DEFAULT_HIVE_TYPE.to_string(),
            status: HiveStatus::Active,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn latest_inspection(&self) -> Option<&Inspection> {
        self.inspections.last()
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.status == HiveStatus::Archived
    }

    /// Queen status of the latest inspection, falling back to the hive-level field.
    #[must_use]
    pub fn effective_queen_status(&self) -> &str {
        match self.latest_inspection() {
            Some(latest) => &latest.queen_status,
            None => self.queen_status.as_deref().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            UNNAMED_HIVE
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LayoutObject {
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(rename = "hiveData", default, skip_serializing_if = "Option::is_none")]
    pub hive_data: Option<HiveRecord>,
}

/// One apiary's full layout: rendering geometry plus the hive records attached to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LayoutDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub objects: Vec<LayoutObject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ApiaryNote {
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
}

impl ApiaryNote {
    #[must_use]
    pub fn undated(text: impl Into<String>) -> Self {
        Self { text: text.into(), date: String::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct QueenStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
}

impl QueenStatus {
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self { name: name.into(), color: color.into() }
    }
}

#[must_use]
pub fn default_queen_statuses() -> Vec<QueenStatus> {
    vec![
        QueenStatus::new("Marked", "#bdf"),
        QueenStatus::new("Unmarked", "#ffd"),
        QueenStatus::new("Missing", "#fbb"),
        QueenStatus::new("Default", "#cfc"),
    ]
}

#[must_use]
pub fn default_hive_types() -> Vec<String> {
    vec![DEFAULT_HIVE_TYPE.to_string()]
}

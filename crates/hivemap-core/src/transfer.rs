//! Export and import of the whole store and of single apiary layouts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ApiaryError, Result};
use crate::notes::split_legacy_note;
use crate::repository::{Repository, Snapshot};
use crate::schema::{
    ApiaryNote, HiveRecord, Inspection, LayoutDocument, QueenStatus, DEFAULT_HIVE_TYPE,
};
use crate::store::KeyValueStore;

pub const EXPORT_VERSION: u32 = 2;
pub const FALLBACK_APIARY: &str = "Default";
const DEFAULT_ZOOM: u32 = 1;

#[derive(Debug, Clone, serde::Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HiveSummary {
    pub name: String,
    pub hive_type: String,
    pub inspections: Vec<Inspection>,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq)]
pub struct ApiaryExport {
    pub canvas: Value,
    /// Summaries keyed by hive name, in layout order.
    pub hives: Map<String, Value>,
    pub note: Vec<ApiaryNote>,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    pub hive_types: Vec<String>,
    pub queen_statuses: Vec<QueenStatus>,
    pub zoom: u32,
    pub snap: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize, PartialEq)]
pub struct MediaExport {
    pub images: Map<String, Value>,
}

/// Whole-store export document.
#[derive(Debug, Clone, serde::Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    /// [`ApiaryExport`] values keyed by apiary name, in list order.
    pub apiaries: Map<String, Value>,
    pub settings: ExportSettings,
    pub media: MediaExport,
    pub last_used: String,
}

/// Single-apiary layout export document.
#[derive(Debug, Clone, serde::Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SingleLayoutDocument {
    pub hive_layout: Value,
    pub queen_statuses: Vec<QueenStatus>,
    pub hive_types: Vec<String>,
    pub apiary_note: String,
    pub all_apiaries: Vec<String>,
    pub current_apiary: String,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub apiaries: Vec<String>,
    pub current: String,
}

fn empty_canvas() -> Value {
    Value::Object(Map::new())
}

/// Structured notes without persisting a migration; unmigrated apiaries fall back to
/// their legacy note.
fn stored_notes<S: KeyValueStore>(repo: &Repository<S>, apiary: &str) -> Result<Vec<ApiaryNote>> {
    match repo.notes(apiary)? {
        Some(notes) => Ok(notes),
        None => Ok(split_legacy_note(&repo.legacy_note(apiary)?.unwrap_or_default())),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| ApiaryError::InvalidFormat(err.to_string()))
}

fn is_group(object: &Value) -> bool {
    object.get("type").and_then(Value::as_str) == Some("group")
}

/// Hive summaries from the `group` objects of a raw canvas. A repeated name keeps its
/// first position and takes the later value. Hive data that does not decode is left
/// out with a warning.
fn summarize(apiary: &str, canvas: &Value) -> Result<Map<String, Value>> {
    let mut hives = Map::new();
    let objects = canvas.get("objects").and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
    for object in objects.iter().filter(|object| is_group(object)) {
        let Some(data) = object.get("hiveData").filter(|data| !data.is_null()) else {
            continue;
        };
        let hive: HiveRecord = match serde_json::from_value(data.clone()) {
            Ok(hive) => hive,
            Err(err) => {
                tracing::warn!(apiary, error = %err, "leaving hive out of export summary");
                continue;
            }
        };
        let name = hive.display_name().to_string();
        let hive_type = if hive.hive_type.is_empty() {
            DEFAULT_HIVE_TYPE.to_string()
        } else {
            hive.hive_type
        };
        let summary = HiveSummary { name: name.clone(), hive_type, inspections: hive.inspections };
        hives.insert(name, to_json(&summary)?);
    }
    Ok(hives)
}

/// Export every apiary with its raw layout, derived hive summary and notes.
///
/// # Errors
/// Returns [`ApiaryError::NoApiaries`] when the store holds no apiaries, or
/// [`ApiaryError::MalformedLayout`] when a stored layout is not JSON at all.
pub fn export_all<S: KeyValueStore>(repo: &Repository<S>) -> Result<ExportDocument> {
    let names = repo.apiaries()?;
    if names.is_empty() {
        return Err(ApiaryError::NoApiaries);
    }

    let mut apiaries = Map::new();
    for name in names {
        let canvas = repo.raw_layout(&name)?.unwrap_or_else(empty_canvas);
        let hives = summarize(&name, &canvas)?;
        let note = stored_notes(repo, &name)?;
        apiaries.insert(name, to_json(&ApiaryExport { canvas, hives, note })?);
    }

    Ok(ExportDocument {
        version: EXPORT_VERSION,
        apiaries,
        settings: ExportSettings {
            hive_types: repo.hive_types()?,
            queen_statuses: repo.queen_statuses()?,
            zoom: DEFAULT_ZOOM,
            snap: true,
        },
        media: MediaExport::default(),
        last_used: repo.current_apiary()?.unwrap_or_default(),
    })
}

fn field<T: DeserializeOwned + Default>(value: Option<&Value>, what: &str) -> Result<T> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| ApiaryError::InvalidFormat(format!("invalid {what}: {err}"))),
    }
}

/// Replace the entire store with the contents of an export document.
///
/// Everything is validated and staged before the store is touched; the replacement
/// itself is a single [`KeyValueStore::replace_all`]. Settings are restored only when
/// the document carries them. A document with no apiaries yields a single empty
/// [`FALLBACK_APIARY`].
///
/// # Errors
/// Returns [`ApiaryError::InvalidFormat`] when `apiaries` is missing or not a mapping,
/// or when a note list or settings collection has the wrong shape.
pub fn import_all<S: KeyValueStore>(repo: &mut Repository<S>, document: &Value) -> Result<ImportSummary> {
    let apiaries = document
        .get("apiaries")
        .and_then(Value::as_object)
        .ok_or_else(|| ApiaryError::InvalidFormat("missing apiaries mapping".to_string()))?;

    let mut snapshot = Snapshot::new();
    let mut names = Vec::with_capacity(apiaries.len());
    for (name, apiary) in apiaries {
        let canvas = match apiary.get("canvas") {
            None | Some(Value::Null) => empty_canvas(),
            Some(canvas) => canvas.clone(),
        };
        let notes: Vec<ApiaryNote> = field(apiary.get("note"), &format!("notes for {name}"))?;
        snapshot.put_raw_layout(name, &canvas)?;
        snapshot.put_notes(name, &notes)?;
        names.push(name.clone());
    }

    if names.is_empty() {
        snapshot.put_layout(FALLBACK_APIARY, &LayoutDocument::empty())?;
        snapshot.put_notes(FALLBACK_APIARY, &[])?;
        names.push(FALLBACK_APIARY.to_string());
    }

    let last_used = document.get("lastUsed").and_then(Value::as_str).unwrap_or_default();
    let current = if names.iter().any(|name| name == last_used) {
        last_used.to_string()
    } else {
        names[0].clone()
    };
    snapshot.put_apiaries(&names)?;
    snapshot.put_current_apiary(&current)?;

    if let Some(settings) = document.get("settings").and_then(Value::as_object) {
        if let Some(types) = settings.get("hiveTypes").filter(|value| !value.is_null()) {
            let types: Vec<String> = field(Some(types), "hive types")?;
            snapshot.put_hive_types(&types)?;
        }
        if let Some(statuses) = settings.get("queenStatuses").filter(|value| !value.is_null()) {
            let statuses: Vec<QueenStatus> = field(Some(statuses), "queen statuses")?;
            snapshot.put_queen_statuses(&statuses)?;
        }
    }

    repo.replace_all(&snapshot)?;
    tracing::info!(apiaries = names.len(), current = %current, "imported whole store");
    Ok(ImportSummary { apiaries: names, current })
}

/// Export one apiary in the single-layout format.
///
/// # Errors
/// Returns [`ApiaryError::ApiaryNotFound`] when `apiary` is not listed, or a read error.
pub fn export_layout<S: KeyValueStore>(repo: &Repository<S>, apiary: &str) -> Result<SingleLayoutDocument> {
    let all_apiaries = repo.apiaries()?;
    if !all_apiaries.iter().any(|name| name == apiary) {
        return Err(ApiaryError::ApiaryNotFound(apiary.to_string()));
    }

    let hive_layout = match repo.raw_layout(apiary)? {
        Some(raw) => raw,
        None => serde_json::to_value(LayoutDocument::empty()).map_err(|err| {
            ApiaryError::MalformedLayout { apiary: apiary.to_string(), reason: err.to_string() }
        })?,
    };
    let apiary_note = match repo.notes(apiary)? {
        Some(notes) => notes.iter().map(|note| note.text.as_str()).collect::<Vec<_>>().join("\n"),
        None => repo.legacy_note(apiary)?.unwrap_or_default(),
    };

    Ok(SingleLayoutDocument {
        hive_layout,
        queen_statuses: repo.queen_statuses()?,
        hive_types: repo.hive_types()?,
        apiary_note,
        all_apiaries,
        current_apiary: apiary.to_string(),
    })
}

/// Apiary name for an imported file: the base name without a `.json` suffix (any
/// case), trimmed.
///
/// # Errors
/// Returns [`ApiaryError::InvalidFormat`] when nothing is left of the name.
pub fn apiary_name_from_file(file_name: &str) -> Result<String> {
    let stem = match file_name.len().checked_sub(".json".len()) {
        Some(cut)
            if file_name.is_char_boundary(cut) && file_name[cut..].eq_ignore_ascii_case(".json") =>
        {
            &file_name[..cut]
        }
        _ => file_name,
    };
    let name = stem.trim();
    if name.is_empty() {
        return Err(ApiaryError::InvalidFormat(format!("no apiary name in file name {file_name:?}")));
    }
    Ok(name.to_string())
}

/// Import a single-layout document as the apiary named after `file_name`, then make it
/// current.
///
/// The apiary is added to the list when absent; an existing apiary of that name has its
/// layout overwritten. Queen statuses in the document replace the stored ones. A
/// non-empty `apiaryNote` is stored as the legacy note; when the apiary already has
/// structured notes, only lines not already present are appended as undated notes, so
/// importing the same file again adds nothing. When `active_layout` is supplied it is
/// flushed under the previous current apiary first.
///
/// # Errors
/// Returns [`ApiaryError::InvalidFormat`] when the layout is missing, the file name is
/// empty, or the queen statuses have the wrong shape. Nothing is written on error.
pub fn import_single_layout<S: KeyValueStore>(
    repo: &mut Repository<S>,
    file_name: &str,
    document: &Value,
    active_layout: Option<&LayoutDocument>,
) -> Result<String> {
    let name = apiary_name_from_file(file_name)?;
    let layout = document
        .get("hiveLayout")
        .filter(|value| !value.is_null())
        .ok_or_else(|| ApiaryError::InvalidFormat("missing hiveLayout".to_string()))?;
    let statuses: Option<Vec<QueenStatus>> = match document.get("queenStatuses") {
        None | Some(Value::Null) => None,
        Some(value) => Some(field(Some(value), "queen statuses")?),
    };
    let note = document.get("apiaryNote").and_then(Value::as_str).unwrap_or_default();

    if let (Some(previous), Some(active)) = (repo.current_apiary()?, active_layout) {
        repo.save_layout(&previous, active)?;
    }
    if let Some(statuses) = statuses {
        repo.save_queen_statuses(&statuses)?;
    }
    if !note.is_empty() {
        match repo.notes(&name)? {
            Some(mut notes) => {
                let before = notes.len();
                for line in split_legacy_note(note) {
                    if !notes.iter().any(|existing| existing.text == line.text) {
                        notes.push(line);
                    }
                }
                if notes.len() > before {
                    repo.save_notes(&name, &notes)?;
                }
            }
            None => repo.save_legacy_note(&name, note)?,
        }
    }
    repo.save_raw_layout(&name, layout)?;

    let mut apiaries = repo.apiaries()?;
    if !apiaries.contains(&name) {
        apiaries.push(name.clone());
        repo.save_apiaries(&apiaries)?;
    }
    repo.save_current_apiary(&name)?;
    tracing::info!(apiary = %name, "imported apiary layout");
    Ok(name)
}

/// # Errors
/// Returns [`ApiaryError::InvalidFormat`] when `text` is not JSON.
pub fn parse_document(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|err| ApiaryError::InvalidFormat(err.to_string()))
}

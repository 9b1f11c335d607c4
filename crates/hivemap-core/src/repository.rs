//! Typed access to the key-value substrate.
//!
//! This is the only module that knows key names or encodes JSON text. Absent keys
//! read back as typed defaults: an empty apiary list, no current apiary, the seed
//! queen statuses and hive types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiaryError, Result};
use crate::schema::{
    default_hive_types, default_queen_statuses, ApiaryNote, LayoutDocument, LayoutObject,
    QueenStatus,
};
use crate::store::KeyValueStore;

pub const ALL_APIARIES_KEY: &str = "allApiaries";
pub const CURRENT_APIARY_KEY: &str = "currentApiary";
pub const QUEEN_STATUSES_KEY: &str = "queenStatuses";
pub const HIVE_TYPES_KEY: &str = "hiveTypes";

const LAYOUT_PREFIX: &str = "hiveLayout:";
const NOTES_PREFIX: &str = "apiaryNotes:";
const LEGACY_NOTE_PREFIX: &str = "apiaryNote:";

#[must_use]
pub fn layout_key(apiary: &str) -> String {
    format!("{LAYOUT_PREFIX}{apiary}")
}

#[must_use]
pub fn notes_key(apiary: &str) -> String {
    format!("{NOTES_PREFIX}{apiary}")
}

#[must_use]
pub fn legacy_note_key(apiary: &str) -> String {
    format!("{LEGACY_NOTE_PREFIX}{apiary}")
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|err| ApiaryError::CorruptRecord { key: key.to_string(), reason: err.to_string() })
}

/// Text values were historically written raw; accept both raw and JSON-encoded forms.
fn decode_text(raw: String) -> String {
    match serde_json::from_str::<String>(&raw) {
        Ok(text) => text,
        Err(_) => raw,
    }
}

fn decode_objects(apiary: &str, raw: Value) -> Result<LayoutDocument> {
    let malformed = |reason: &str| ApiaryError::MalformedLayout {
        apiary: apiary.to_string(),
        reason: reason.to_string(),
    };
    let Value::Object(mut extra) = raw else {
        return Err(malformed("layout is not a JSON object"));
    };
    let items = match extra.remove("objects") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(malformed("`objects` is not a list")),
    };

    let mut objects = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<LayoutObject>(item) {
            Ok(object) => objects.push(object),
            Err(err) => {
                tracing::warn!(apiary, index, error = %err, "skipping undecodable layout object");
            }
        }
    }
    Ok(LayoutDocument { objects, extra })
}

#[derive(Debug)]
pub struct Repository<S> {
    store: S,
}

impl<S: KeyValueStore> Repository<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| {
            tracing::warn!(key, error = %err, "stored record failed to decode");
            ApiaryError::CorruptRecord { key: key.to_string(), reason: err.to_string() }
        })
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let encoded = encode(key, value)?;
        self.store.set(key, &encoded)
    }

    /// # Errors
    /// Returns an error when the list cannot be read or decoded.
    pub fn apiaries(&self) -> Result<Vec<String>> {
        Ok(self.read_json(ALL_APIARIES_KEY)?.unwrap_or_default())
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_apiaries(&mut self, apiaries: &[String]) -> Result<()> {
        self.write_json(ALL_APIARIES_KEY, apiaries)
    }

    /// # Errors
    /// Returns an error when the substrate cannot be read.
    pub fn current_apiary(&self) -> Result<Option<String>> {
        Ok(self.store.get(CURRENT_APIARY_KEY)?.map(decode_text).filter(|name| !name.is_empty()))
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_current_apiary(&mut self, apiary: &str) -> Result<()> {
        self.write_json(CURRENT_APIARY_KEY, apiary)
    }

    /// # Errors
    /// Returns an error when the list cannot be read or decoded.
    pub fn queen_statuses(&self) -> Result<Vec<QueenStatus>> {
        Ok(self.read_json(QUEEN_STATUSES_KEY)?.unwrap_or_else(default_queen_statuses))
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_queen_statuses(&mut self, statuses: &[QueenStatus]) -> Result<()> {
        self.write_json(QUEEN_STATUSES_KEY, statuses)
    }

    /// # Errors
    /// Returns an error when the list cannot be read or decoded.
    pub fn hive_types(&self) -> Result<Vec<String>> {
        Ok(self.read_json(HIVE_TYPES_KEY)?.unwrap_or_else(default_hive_types))
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_hive_types(&mut self, types: &[String]) -> Result<()> {
        self.write_json(HIVE_TYPES_KEY, types)
    }

    /// Decode one apiary's layout.
    ///
    /// # Errors
    /// Returns [`ApiaryError::MalformedLayout`] when the stored document does not decode.
    pub fn layout(&self, apiary: &str) -> Result<Option<LayoutDocument>> {
        let Some(raw) = self.store.get(&layout_key(apiary))? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| ApiaryError::MalformedLayout {
            apiary: apiary.to_string(),
            reason: err.to_string(),
        })
    }

    /// The stored layout as untyped JSON, exactly as persisted.
    ///
    /// # Errors
    /// Returns [`ApiaryError::MalformedLayout`] when the stored text is not JSON.
    pub fn raw_layout(&self, apiary: &str) -> Result<Option<Value>> {
        let Some(raw) = self.store.get(&layout_key(apiary))? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| ApiaryError::MalformedLayout {
            apiary: apiary.to_string(),
            reason: err.to_string(),
        })
    }

    /// Decode one apiary's layout object by object for read-only scans. Objects that
    /// still fail to decode are logged and left out.
    ///
    /// # Errors
    /// Returns [`ApiaryError::MalformedLayout`] when the stored text is not JSON, is not
    /// an object, or carries an `objects` field that is not a list.
    pub fn scan_layout(&self, apiary: &str) -> Result<Option<LayoutDocument>> {
        let Some(raw) = self.raw_layout(apiary)? else {
            return Ok(None);
        };
        decode_objects(apiary, raw).map(Some)
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_layout(&mut self, apiary: &str, layout: &LayoutDocument) -> Result<()> {
        self.write_json(&layout_key(apiary), layout)
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_raw_layout(&mut self, apiary: &str, layout: &Value) -> Result<()> {
        self.write_json(&layout_key(apiary), layout)
    }

    /// Structured notes, or `None` when the apiary has never been migrated.
    ///
    /// # Errors
    /// Returns an error when the stored notes cannot be read or decoded.
    pub fn notes(&self, apiary: &str) -> Result<Option<Vec<ApiaryNote>>> {
        self.read_json(&notes_key(apiary))
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_notes(&mut self, apiary: &str, notes: &[ApiaryNote]) -> Result<()> {
        self.write_json(&notes_key(apiary), notes)
    }

    /// # Errors
    /// Returns an error when the substrate cannot be read.
    pub fn legacy_note(&self, apiary: &str) -> Result<Option<String>> {
        Ok(self.store.get(&legacy_note_key(apiary))?.map(decode_text))
    }

    /// # Errors
    /// Returns an error when the substrate rejects the write.
    pub fn save_legacy_note(&mut self, apiary: &str, note: &str) -> Result<()> {
        self.write_json(&legacy_note_key(apiary), note)
    }

    /// Move every per-apiary entry from `from` to `to`, deleting the old keys.
    ///
    /// # Errors
    /// Returns an error when the substrate rejects any read or write.
    pub fn move_apiary_records(&mut self, from: &str, to: &str) -> Result<()> {
        for (old_key, new_key) in [
            (layout_key(from), layout_key(to)),
            (notes_key(from), notes_key(to)),
            (legacy_note_key(from), legacy_note_key(to)),
        ] {
            if let Some(value) = self.store.get(&old_key)? {
                self.store.set(&new_key, &value)?;
                self.store.remove(&old_key)?;
            }
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error when the substrate rejects any delete.
    pub fn delete_apiary_records(&mut self, apiary: &str) -> Result<()> {
        self.store.remove(&layout_key(apiary))?;
        self.store.remove(&notes_key(apiary))?;
        self.store.remove(&legacy_note_key(apiary))
    }

    /// Replace the whole store with `snapshot` in one step.
    ///
    /// # Errors
    /// Returns an error when the substrate rejects the replacement.
    pub fn replace_all(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.store.replace_all(&snapshot.entries)
    }
}

/// A complete set of entries staged for whole-store replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, String)>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn put<T: Serialize + ?Sized>(&mut self, key: String, value: &T) -> Result<()> {
        let encoded = encode(&key, value)?;
        self.entries.retain(|(existing, _)| *existing != key);
        self.entries.push((key, encoded));
        Ok(())
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_apiaries(&mut self, apiaries: &[String]) -> Result<()> {
        self.put(ALL_APIARIES_KEY.to_string(), apiaries)
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_current_apiary(&mut self, apiary: &str) -> Result<()> {
        self.put(CURRENT_APIARY_KEY.to_string(), apiary)
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_raw_layout(&mut self, apiary: &str, layout: &Value) -> Result<()> {
        self.put(layout_key(apiary), layout)
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_layout(&mut self, apiary: &str, layout: &LayoutDocument) -> Result<()> {
        self.put(layout_key(apiary), layout)
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_notes(&mut self, apiary: &str, notes: &[ApiaryNote]) -> Result<()> {
        self.put(notes_key(apiary), notes)
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_queen_statuses(&mut self, statuses: &[QueenStatus]) -> Result<()> {
        self.put(QUEEN_STATUSES_KEY.to_string(), statuses)
    }

    /// # Errors
    /// Returns an error when the value cannot be encoded.
    pub fn put_hive_types(&mut self, types: &[String]) -> Result<()> {
        self.put(HIVE_TYPES_KEY.to_string(), types)
    }
}

//! Shared State Store & Reconciler
//!
//! One [`SharedStateDocument`] per session, read by every rendered component
//! and by the agent, written through keyed partial merges.
//!
//! # Merge Protocol
//!
//! ```text
//!   patch {"f1": {...}, "f2": {...}}  ──▶  formData
//!                                          ├── f1  ← replaced
//!                                          ├── f2  ← replaced
//!                                          └── f3  (untouched)
//!                                          lastUpdate = max(now, prev + 1)
//! ```
//!
//! Each top-level key of a patch replaces the entry under that section; the
//! merge is shallow, so nested values are never combined. Concurrent writers
//! to the same key resolve as **last writer wins, in lock arrival order**.
//! Writers that need more than that read `lastUpdate` and use
//! [`StateStore::apply_patch_if`], which refuses to apply over a newer
//! document.
//!
//! # Thread Safety
//!
//! The document sits behind one `parking_lot::Mutex`; every public
//! operation is a single atomic read-modify-write. The store never does I/O
//! and never blocks beyond the lock.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::clock::{next_timestamp, SystemClock, TimeSource};

/// Result type alias for state operations
pub type StateResult<T> = Result<T, StateError>;

/// Errors from the state store
///
/// All of them are raised before the document is touched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StateError {
    /// Section key is not `components`, `formData` or `appData`
    #[error("unknown state section {section:?} (expected components, formData or appData)")]
    InvalidSection {
        /// The key as received
        section: String,
    },

    /// Patch is not a JSON object
    #[error("patch must be a JSON object, found {found}")]
    PatchNotObject {
        /// Kind of the value received
        found: &'static str,
    },

    /// Conditional patch over a document that moved on
    #[error("document changed: expected lastUpdate {expected}, current {current}")]
    Stale {
        /// `lastUpdate` the caller based its patch on
        expected: u64,
        /// `lastUpdate` at the time of the attempt
        current: u64,
    },
}

/// Writable section of the document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    /// Component id → component-local state
    Components,
    /// Form id → field name → value
    FormData,
    /// Free-form application data
    AppData,
}

impl Section {
    /// All sections, in document order
    pub const ALL: [Section; 3] = [Self::Components, Self::FormData, Self::AppData];

    /// Wire name of the section
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Components => "components",
            Self::FormData => "formData",
            Self::AppData => "appData",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| StateError::InvalidSection {
                section: s.to_string(),
            })
    }
}

/// The shared document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStateDocument {
    /// Component id → component-local state
    pub components: Map<String, Value>,
    /// Form id → field name → value
    pub form_data: Map<String, Value>,
    /// Free-form application data
    pub app_data: Map<String, Value>,
    /// Unix milliseconds of the last mutation, strictly increasing
    pub last_update: u64,
}

impl SharedStateDocument {
    /// Empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow one section
    #[must_use]
    pub fn section(&self, section: Section) -> &Map<String, Value> {
        match section {
            Section::Components => &self.components,
            Section::FormData => &self.form_data,
            Section::AppData => &self.app_data,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut Map<String, Value> {
        match section {
            Section::Components => &mut self.components,
            Section::FormData => &mut self.form_data,
            Section::AppData => &mut self.app_data,
        }
    }

    /// Whether all three sections are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Section::ALL.iter().all(|s| self.section(*s).is_empty())
    }
}

/// Owner of one [`SharedStateDocument`]
///
/// Fields are private; callers go through [`apply_patch`](Self::apply_patch),
/// [`apply_patch_if`](Self::apply_patch_if), [`remove_keys`](Self::remove_keys)
/// and [`read_section`](Self::read_section).
#[derive(Debug)]
pub struct StateStore {
    doc: Mutex<SharedStateDocument>,
    clock: Arc<dyn TimeSource>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Empty store on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store on a custom clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            doc: Mutex::new(SharedStateDocument::new()),
            clock,
        }
    }

    /// Merge `patch` into `section`
    ///
    /// Returns the document as it stands after the merge.
    ///
    /// # Errors
    ///
    /// [`StateError::PatchNotObject`] if `patch` is not an object. The
    /// document is left untouched.
    pub fn apply_patch(&self, section: Section, patch: Value) -> StateResult<SharedStateDocument> {
        let patch = into_object(patch)?;
        let mut doc = self.doc.lock();
        Ok(self.merge_locked(&mut doc, section, patch))
    }

    /// Merge `patch` only if `lastUpdate` still equals `expected`
    ///
    /// # Errors
    ///
    /// [`StateError::Stale`] if another write landed in between, or
    /// [`StateError::PatchNotObject`]. Neither mutates the document.
    pub fn apply_patch_if(
        &self,
        section: Section,
        patch: Value,
        expected: u64,
    ) -> StateResult<SharedStateDocument> {
        let patch = into_object(patch)?;
        let mut doc = self.doc.lock();
        if doc.last_update != expected {
            tracing::debug!(
                section = %section,
                expected = expected,
                current = doc.last_update,
                "Conditional patch refused"
            );
            return Err(StateError::Stale {
                expected,
                current: doc.last_update,
            });
        }
        Ok(self.merge_locked(&mut doc, section, patch))
    }

    /// Delete `keys` from `section`
    ///
    /// Missing keys are ignored; `lastUpdate` advances regardless.
    pub fn remove_keys<S: AsRef<str>>(&self, section: Section, keys: &[S]) -> SharedStateDocument {
        let mut doc = self.doc.lock();
        let target = doc.section_mut(section);
        let removed = keys
            .iter()
            .filter(|k| target.remove(k.as_ref()).is_some())
            .count();
        doc.last_update = next_timestamp(doc.last_update, self.clock.now_ms());
        tracing::debug!(
            section = %section,
            removed = removed,
            last_update = doc.last_update,
            "Removed keys"
        );
        doc.clone()
    }

    /// Read the whole document, one section, or one entry of a section
    ///
    /// The section key is parsed from its wire name. A missing entry reads
    /// as `null`.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidSection`] for an unknown section key.
    pub fn read_section(&self, section: Option<&str>, key: Option<&str>) -> StateResult<Value> {
        let Some(section) = section else {
            return Ok(serde_json::to_value(self.snapshot()).unwrap_or(Value::Null));
        };
        let section = section.parse::<Section>()?;
        let doc = self.doc.lock();
        let map = doc.section(section);
        Ok(match key {
            Some(key) => map.get(key).cloned().unwrap_or(Value::Null),
            None => Value::Object(map.clone()),
        })
    }

    /// One entry of a section
    #[must_use]
    pub fn get(&self, section: Section, key: &str) -> Option<Value> {
        self.doc.lock().section(section).get(key).cloned()
    }

    /// Copy of the whole document
    #[must_use]
    pub fn snapshot(&self) -> SharedStateDocument {
        self.doc.lock().clone()
    }

    /// Current `lastUpdate`
    #[must_use]
    pub fn last_update(&self) -> u64 {
        self.doc.lock().last_update
    }

    /// Lock the document for a multi-part operation
    pub(crate) fn lock(&self) -> MutexGuard<'_, SharedStateDocument> {
        self.doc.lock()
    }

    /// Empty every section of a locked document
    pub(crate) fn clear_locked(&self, doc: &mut SharedStateDocument) {
        doc.components.clear();
        doc.form_data.clear();
        doc.app_data.clear();
        doc.last_update = next_timestamp(doc.last_update, self.clock.now_ms());
    }

    /// Replace a locked document, keeping `lastUpdate` increasing
    pub(crate) fn replace_locked(&self, doc: &mut SharedStateDocument, with: SharedStateDocument) {
        let floor = doc.last_update;
        *doc = with;
        doc.last_update = doc.last_update.max(floor.saturating_add(1));
    }

    fn merge_locked(
        &self,
        doc: &mut SharedStateDocument,
        section: Section,
        patch: Map<String, Value>,
    ) -> SharedStateDocument {
        let keys = patch.len();
        doc.section_mut(section).extend(patch);
        doc.last_update = next_timestamp(doc.last_update, self.clock.now_ms());
        tracing::debug!(
            section = %section,
            keys = keys,
            last_update = doc.last_update,
            "Applied patch"
        );
        doc.clone()
    }
}

fn into_object(patch: Value) -> StateResult<Map<String, Value>> {
    match patch {
        Value::Object(map) => Ok(map),
        other => Err(StateError::PatchNotObject {
            found: value_kind(&other),
        }),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store_at(ms: u64) -> (Arc<ManualClock>, StateStore) {
        let clock = Arc::new(ManualClock::new(ms));
        let store = StateStore::with_clock(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("formData".parse::<Section>(), Ok(Section::FormData));
        assert_eq!(
            "form_data".parse::<Section>(),
            Err(StateError::InvalidSection {
                section: "form_data".to_string()
            })
        );
    }

    #[test]
    fn test_new_document_is_empty() {
        let store = StateStore::new();
        let doc = store.snapshot();
        assert!(doc.is_empty());
        assert_eq!(doc.last_update, 0);
    }

    #[test]
    fn test_same_key_last_writer_wins() {
        let (_clock, store) = store_at(1_000);
        store
            .apply_patch(Section::FormData, json!({"f1": {"email": "a@x.com"}}))
            .unwrap();
        let first = store.last_update();
        store
            .apply_patch(Section::FormData, json!({"f1": {"email": "b@x.com"}}))
            .unwrap();

        assert_eq!(
            store.read_section(Some("formData"), Some("f1")).unwrap(),
            json!({"email": "b@x.com"})
        );
        assert!(store.last_update() > first);
    }

    #[test]
    fn test_merge_is_shallow() {
        let (_clock, store) = store_at(1);
        store
            .apply_patch(Section::AppData, json!({"prefs": {"theme": "dark", "lang": "en"}}))
            .unwrap();
        let doc = store
            .apply_patch(Section::AppData, json!({"prefs": {"theme": "light"}}))
            .unwrap();
        assert_eq!(doc.app_data.get("prefs"), Some(&json!({"theme": "light"})));
    }

    #[test]
    fn test_disjoint_patches_commute() {
        let p1 = json!({"a": 1, "b": [1, 2]});
        let p2 = json!({"c": {"deep": true}});

        let (_c1, s1) = store_at(10);
        s1.apply_patch(Section::Components, p1.clone()).unwrap();
        s1.apply_patch(Section::Components, p2.clone()).unwrap();

        let (_c2, s2) = store_at(10);
        s2.apply_patch(Section::Components, p2).unwrap();
        s2.apply_patch(Section::Components, p1).unwrap();

        let mut d1 = s1.snapshot();
        let mut d2 = s2.snapshot();
        d1.last_update = 0;
        d2.last_update = 0;
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_last_update_strictly_increases_within_one_tick() {
        let (clock, store) = store_at(5_000);
        let mut previous = 0;
        for i in 0..5 {
            let doc = store
                .apply_patch(Section::AppData, json!({ "k": i }))
                .unwrap();
            assert!(doc.last_update > previous);
            previous = doc.last_update;
        }
        assert_eq!(previous, 5_004);

        // Clock going backwards does not move lastUpdate back
        clock.set(10);
        let doc = store.apply_patch(Section::AppData, json!({"k": "x"})).unwrap();
        assert_eq!(doc.last_update, 5_005);

        clock.set(9_000);
        let doc = store.apply_patch(Section::AppData, json!({"k": "y"})).unwrap();
        assert_eq!(doc.last_update, 9_000);
    }

    #[test]
    fn test_patch_not_object_does_not_mutate() {
        let (_clock, store) = store_at(1);
        let err = store
            .apply_patch(Section::AppData, json!(["a"]))
            .unwrap_err();
        assert_eq!(err, StateError::PatchNotObject { found: "array" });
        assert_eq!(store.last_update(), 0);
    }

    #[test]
    fn test_conditional_patch() {
        let (_clock, store) = store_at(100);
        let base = store
            .apply_patch(Section::AppData, json!({"count": 1}))
            .unwrap()
            .last_update;

        let doc = store
            .apply_patch_if(Section::AppData, json!({"count": 2}), base)
            .unwrap();
        assert_eq!(doc.app_data.get("count"), Some(&json!(2)));

        let err = store
            .apply_patch_if(Section::AppData, json!({"count": 3}), base)
            .unwrap_err();
        assert_eq!(
            err,
            StateError::Stale {
                expected: base,
                current: doc.last_update
            }
        );
        assert_eq!(store.get(Section::AppData, "count"), Some(json!(2)));
    }

    #[test]
    fn test_remove_keys() {
        let (_clock, store) = store_at(1);
        store
            .apply_patch(Section::Components, json!({"a": 1, "b": 2}))
            .unwrap();
        let before = store.last_update();
        let doc = store.remove_keys(Section::Components, &["a", "missing"]);
        assert_eq!(doc.components.len(), 1);
        assert!(doc.components.contains_key("b"));
        assert!(doc.last_update > before);
    }

    #[test]
    fn test_read_section_shapes() {
        let (_clock, store) = store_at(42);
        store
            .apply_patch(Section::FormData, json!({"f1": {"name": "x"}}))
            .unwrap();

        let whole = store.read_section(None, None).unwrap();
        assert_eq!(whole["formData"]["f1"]["name"], json!("x"));
        assert_eq!(whole["lastUpdate"], json!(42));

        assert_eq!(
            store.read_section(Some("formData"), None).unwrap(),
            json!({"f1": {"name": "x"}})
        );
        assert_eq!(
            store.read_section(Some("appData"), Some("nope")).unwrap(),
            Value::Null
        );
        assert!(matches!(
            store.read_section(Some("bogus"), None),
            Err(StateError::InvalidSection { .. })
        ));
    }

    #[test]
    fn test_document_wire_names() {
        let doc = SharedStateDocument::new();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({"components": {}, "formData": {}, "appData": {}, "lastUpdate": 0})
        );
    }
}

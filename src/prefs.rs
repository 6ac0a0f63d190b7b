//! User style preferences.
//!
//! Preferences are stored per scope: one global record, one for the library
//! page, and one per book (keyed by the book's unique identifier). A book or
//! library setting with `useGlobal` set defers to the global record.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which record a preference belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum StyleScope {
    Global,
    Library,
    Book(String),
}

impl StyleScope {
    /// Key the record is stored under.
    pub fn storage_key(&self) -> String {
        match self {
            StyleScope::Global => "basalt.style.global".to_string(),
            StyleScope::Library => "basalt.style.library".to_string(),
            StyleScope::Book(id) => format!("basalt.style.book.{id}"),
        }
    }
}

/// One adjustable axis of a style record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSetting {
    #[serde(default)]
    pub value: Option<String>,
    /// Whether the value beats the book's own styles.
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub overrides: Option<bool>,
    /// Defer to the global record. Never set on the global record itself.
    #[serde(default, rename = "useGlobal", skip_serializing_if = "Option::is_none")]
    pub use_global: Option<bool>,
}

impl StyleSetting {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn overriding(mut self) -> Self {
        self.overrides = Some(true);
        self
    }

    pub fn using_global(mut self) -> Self {
        self.use_global = Some(true);
        self
    }

    /// The value, if set and not blank.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn is_override(&self) -> bool {
        self.overrides.unwrap_or(false)
    }

    fn uses_global(&self) -> bool {
        self.use_global.unwrap_or(false)
    }
}

/// Style preferences of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRecord {
    /// Font family list.
    #[serde(default)]
    pub font: StyleSetting,
    /// Extra CSS layered under the book's own styles.
    #[serde(default)]
    pub custom_css_no_override: StyleSetting,
}

impl StyleRecord {
    /// Resolve `useGlobal` settings against the global record.
    pub fn resolve(&self, global: &StyleRecord) -> StyleRecord {
        let pick = |own: &StyleSetting, global: &StyleSetting| {
            if own.uses_global() {
                StyleSetting {
                    use_global: None,
                    ..global.clone()
                }
            } else {
                own.clone()
            }
        };
        StyleRecord {
            font: pick(&self.font, &global.font),
            custom_css_no_override: pick(
                &self.custom_css_no_override,
                &global.custom_css_no_override,
            ),
        }
    }

    /// Drop fields that make no sense for `scope`.
    fn normalized_for(mut self, scope: &StyleScope) -> Self {
        if *scope == StyleScope::Global {
            self.font.use_global = None;
            self.custom_css_no_override.use_global = None;
        }
        self
    }
}

/// Where style records live.
pub trait PreferenceStore {
    fn load(&self, scope: &StyleScope) -> Result<Option<StyleRecord>>;
    fn save(&mut self, scope: &StyleScope, record: &StyleRecord) -> Result<()>;

    /// Record for `scope` with `useGlobal` resolved. Missing records are
    /// empty.
    fn effective(&self, scope: &StyleScope) -> Result<StyleRecord> {
        let global = self.load(&StyleScope::Global)?.unwrap_or_default();
        if *scope == StyleScope::Global {
            return Ok(global);
        }
        let own = self.load(scope)?.unwrap_or_default();
        Ok(own.resolve(&global))
    }
}

/// Preferences kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    records: HashMap<StyleScope, StyleRecord>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, scope: &StyleScope) -> Result<Option<StyleRecord>> {
        Ok(self.records.get(scope).cloned())
    }

    fn save(&mut self, scope: &StyleScope, record: &StyleRecord) -> Result<()> {
        self.records
            .insert(scope.clone(), record.clone().normalized_for(scope));
        Ok(())
    }
}

/// Preferences persisted as one JSON object keyed by
/// [`StyleScope::storage_key`].
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    records: BTreeMap<String, StyleRecord>,
}

impl JsonPreferenceStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            BTreeMap::new()
        };
        log::debug!("loaded {} style records from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn load(&self, scope: &StyleScope) -> Result<Option<StyleRecord>> {
        Ok(self.records.get(&scope.storage_key()).cloned())
    }

    fn save(&mut self, scope: &StyleScope, record: &StyleRecord) -> Result<()> {
        self.records
            .insert(scope.storage_key(), record.clone().normalized_for(scope));
        let json = serde_json::to_vec_pretty(&self.records)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = StyleRecord {
            font: StyleSetting::new("Georgia").overriding().using_global(),
            custom_css_no_override: StyleSetting::new("p { margin: 0 }"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "font": {"value": "Georgia", "override": true, "useGlobal": true},
                "customCssNoOverride": {"value": "p { margin: 0 }"}
            })
        );

        let parsed: StyleRecord =
            serde_json::from_str(r#"{"font": {"value": null, "override": false}}"#).unwrap();
        assert_eq!(parsed.font.value(), None);
        assert!(!parsed.font.is_override());
    }

    #[test]
    fn test_scope_keys() {
        assert_eq!(StyleScope::Global.storage_key(), "basalt.style.global");
        assert_eq!(
            StyleScope::Book("urn:isbn:1".into()).storage_key(),
            "basalt.style.book.urn:isbn:1"
        );
    }

    #[test]
    fn test_effective_resolves_use_global() {
        let mut store = MemoryPreferenceStore::new();
        store
            .save(
                &StyleScope::Global,
                &StyleRecord {
                    font: StyleSetting::new("serif").overriding().using_global(),
                    ..StyleRecord::default()
                },
            )
            .unwrap();
        let book = StyleScope::Book("b".into());
        store
            .save(
                &book,
                &StyleRecord {
                    font: StyleSetting::new("Comic Sans").using_global(),
                    custom_css_no_override: StyleSetting::new("p{}"),
                },
            )
            .unwrap();

        let effective = store.effective(&book).unwrap();
        assert_eq!(effective.font.value(), Some("serif"));
        assert!(effective.font.is_override());
        assert_eq!(effective.font.use_global, None);
        assert_eq!(effective.custom_css_no_override.value(), Some("p{}"));

        // useGlobal is stripped from the global record on save
        let global = store.load(&StyleScope::Global).unwrap().unwrap();
        assert_eq!(global.font.use_global, None);

        let library = store.effective(&StyleScope::Library).unwrap();
        assert_eq!(library, StyleRecord::default());
    }

    #[test]
    fn test_json_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = JsonPreferenceStore::open(&path).unwrap();
        assert_eq!(store.load(&StyleScope::Library).unwrap(), None);
        let record = StyleRecord {
            font: StyleSetting::new("Literata"),
            ..StyleRecord::default()
        };
        store.save(&StyleScope::Library, &record).unwrap();

        let reopened = JsonPreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.load(&StyleScope::Library).unwrap(), Some(record));
        assert_eq!(reopened.path(), path);
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            JsonPreferenceStore::open(&path),
            Err(crate::error::Error::Json(_))
        ));
    }
}

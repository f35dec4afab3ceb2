use crate::appearance::FontSize;
use crate::error::WheelError;
use crate::segments::{Segment, default_segments, segments_from_value};
use crate::storage::{SharedStore, keys, persist_json};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};
use spinctl::types::{ConfigName, ImageRef};
use std::collections::BTreeMap;
use std::path::Path;
use strum::Display as StrumDisplay;

pub const EXPORT_EXTENSION: &str = "pinwheel";
/// Extensions accepted on import; exports are plain JSON under a custom extension.
pub const IMPORT_EXTENSIONS: &[&str] = &[EXPORT_EXTENSION, "json"];

/// Everything a configuration captures. Serializes to the export document shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub segments: Vec<Segment>,
    #[serde(rename = "capImageDataUrl")]
    pub cap_image: Option<ImageRef>,
    pub font_size: FontSize,
}

/// A field of an imported document that was unusable and replaced by its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "camelCase")]
pub enum Fallback {
    Segments,
    CapImageDataUrl,
    FontSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub snapshot: Snapshot,
    pub fallbacks: Vec<Fallback>,
}

impl Snapshot {
    /// Lenient reading of a configuration document. Only a non-object top level is fatal;
    /// every other unusable field falls back on its own.
    pub fn from_document(value: &Value) -> Result<ImportReport, WheelError> {
        let Value::Object(fields) = value else {
            return Err(WheelError::Malformed(
                "expected a configuration object".to_string(),
            ));
        };
        let mut fallbacks = Vec::new();

        let segments = match fields.get("segments").and_then(segments_from_value) {
            Some(segments) => segments,
            None => {
                fallbacks.push(Fallback::Segments);
                default_segments()
            }
        };

        let cap_image = match fields.get("capImageDataUrl") {
            None | Some(Value::Null) => None,
            Some(Value::String(url)) => (!url.is_empty()).then(|| ImageRef::new(url.as_str())),
            Some(_) => {
                fallbacks.push(Fallback::CapImageDataUrl);
                None
            }
        };

        let font_size = match fields.get("fontSize") {
            None | Some(Value::Null) => FontSize::default(),
            Some(value) => match value.as_f64().and_then(FontSize::checked) {
                Some(size) => size,
                None => {
                    fallbacks.push(Fallback::FontSize);
                    FontSize::default()
                }
            },
        };

        Ok(ImportReport {
            snapshot: Self {
                segments,
                cap_image,
                font_size,
            },
            fallbacks,
        })
    }
}

/// Whether the wheel should also write an applied snapshot into the current working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Durable,
    SessionOnly,
}

impl Persistence {
    pub fn is_durable(self) -> bool {
        self == Self::Durable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfiguration {
    pub snapshot: Snapshot,
    pub persistence: Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub contents: String,
}

pub fn is_importable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMPORT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

pub fn export(snapshot: &Snapshot) -> Result<ExportedFile, WheelError> {
    export_at(snapshot, Local::now())
}

pub fn export_at(snapshot: &Snapshot, at: DateTime<Local>) -> Result<ExportedFile, WheelError> {
    Ok(ExportedFile {
        file_name: format!(
            "pinwheel-{}.{}",
            at.format("%Y%m%d-%H%M%S"),
            EXPORT_EXTENSION
        ),
        contents: serde_json::to_string_pretty(snapshot)?,
    })
}

pub fn import_from_text(text: &str) -> Result<ImportReport, WheelError> {
    let value: Value = serde_json::from_str(text)?;
    let report = Snapshot::from_document(&value)?;
    for fallback in &report.fallbacks {
        log::warn!("Imported '{}' was invalid, using the default", fallback);
    }
    Ok(report)
}

/// Named snapshots. The table lives in memory and is written back whole after each change;
/// a failed write leaves the in-memory table as changed.
pub struct ConfigurationRepository {
    store: SharedStore,
    table: BTreeMap<ConfigName, Snapshot>,
}

impl ConfigurationRepository {
    pub fn load(store: SharedStore) -> Self {
        let table = match store.get(keys::CONFIGURATIONS) {
            Ok(Some(raw)) => Self::parse_table(&raw),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read configurations: {}", e);
                BTreeMap::new()
            }
        };
        Self { store, table }
    }

    fn parse_table(raw: &str) -> BTreeMap<ConfigName, Snapshot> {
        let entries = match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Error parsing configurations: {}", e);
                return BTreeMap::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(name, value)| match Snapshot::from_document(&value) {
                Ok(report) => Some((ConfigName::new(name), report.snapshot)),
                Err(e) => {
                    log::warn!("Dropping configuration '{}': {}", name, e);
                    None
                }
            })
            .collect()
    }

    /// Sorted for stability only; the order carries no meaning.
    pub fn list_names(&self) -> Vec<ConfigName> {
        self.table.keys().cloned().collect()
    }

    pub fn contains(&self, name: &ConfigName) -> bool {
        self.table.contains_key(name)
    }

    /// Stores a copy of `snapshot` under the trimmed `name`, replacing any previous entry.
    pub fn save(&mut self, name: &str, snapshot: &Snapshot) -> Result<ConfigName, WheelError> {
        let name = ConfigName::parse(name).ok_or(WheelError::Validation(
            "Please enter a name for the configuration.",
        ))?;
        self.table.insert(name.clone(), snapshot.clone());
        self.persist().map(|()| name)
    }

    pub fn load_config(
        &self,
        name: &ConfigName,
        persistence: Persistence,
    ) -> Result<LoadedConfiguration, WheelError> {
        let name = name.trimmed();
        let snapshot = self
            .table
            .get(&name)
            .cloned()
            .ok_or(WheelError::NotFound(name))?;
        Ok(LoadedConfiguration {
            snapshot,
            persistence,
        })
    }

    pub fn delete(&mut self, name: &ConfigName) -> Result<(), WheelError> {
        let name = name.trimmed();
        self.table
            .remove(&name)
            .ok_or(WheelError::NotFound(name))?;
        self.persist()
    }

    fn persist(&self) -> Result<(), WheelError> {
        persist_json(
            self.store.as_ref(),
            keys::CONFIGURATIONS,
            &self.table,
            "configurations",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn snapshot(texts: &[&str], cap: Option<&str>, font: f64) -> Snapshot {
        Snapshot {
            segments: texts.iter().map(|t| Segment::new(*t, None)).collect(),
            cap_image: cap.map(ImageRef::from),
            font_size: FontSize::or_default(font),
        }
    }

    #[test]
    fn test_save_then_load_is_isolated_from_later_edits() {
        let memory = Arc::new(MemoryStore::new());
        let mut repo = ConfigurationRepository::load(memory.clone());

        let mut live = snapshot(&["A", "B"], Some("data:cap"), 24.0);
        let name = repo.save("  lunch ", &live).unwrap();
        assert_eq!(name, ConfigName::from("lunch"));

        live.segments.push(Segment::new("C", None));
        live.segments[0].text = "changed".to_string();

        let loaded = repo.load_config(&name, Persistence::Durable).unwrap();
        assert_eq!(loaded.snapshot, snapshot(&["A", "B"], Some("data:cap"), 24.0));
        assert_eq!(loaded.persistence, Persistence::Durable);

        // and it survives a restart
        let reopened = ConfigurationRepository::load(memory);
        assert_eq!(
            reopened.load_config(&name, Persistence::Durable).unwrap().snapshot,
            loaded.snapshot
        );
    }

    #[test]
    fn test_persisted_table_has_document_shape() {
        let memory = Arc::new(MemoryStore::new());
        let mut repo = ConfigurationRepository::load(memory.clone());
        repo.save("x", &snapshot(&["A"], None, 18.0)).unwrap();

        let raw: Value =
            serde_json::from_str(&memory.get(keys::CONFIGURATIONS).unwrap().unwrap()).unwrap();
        assert_eq!(
            raw,
            json!({"x": {
                "segments": [{"text": "A", "image": null}],
                "capImageDataUrl": null,
                "fontSize": 18
            }})
        );
    }

    #[test]
    fn test_blank_names_are_rejected() {
        let mut repo = ConfigurationRepository::load(Arc::new(MemoryStore::new()));
        let err = repo.save("   ", &snapshot(&["A", "B"], None, 18.0)).unwrap_err();
        assert!(matches!(err, WheelError::Validation(_)));
        assert!(repo.list_names().is_empty());
    }

    #[test]
    fn test_unknown_names_are_not_found() {
        let mut repo = ConfigurationRepository::load(Arc::new(MemoryStore::new()));
        let ghost = ConfigName::from("ghost");
        assert!(matches!(
            repo.load_config(&ghost, Persistence::Durable),
            Err(WheelError::NotFound(n)) if n == ghost
        ));
        assert!(matches!(repo.delete(&ghost), Err(WheelError::NotFound(_))));
    }

    #[test]
    fn test_padded_names_find_the_saved_configuration() {
        let mut repo = ConfigurationRepository::load(Arc::new(MemoryStore::new()));
        repo.save(" party ", &snapshot(&["A", "B"], None, 18.0)).unwrap();

        let padded = ConfigName::from(" party ");
        let loaded = repo.load_config(&padded, Persistence::Durable).unwrap();
        assert_eq!(loaded.snapshot, snapshot(&["A", "B"], None, 18.0));

        repo.delete(&padded).unwrap();
        assert!(repo.list_names().is_empty());
    }

    #[test]
    fn test_delete_removes_and_persists() {
        let memory = Arc::new(MemoryStore::new());
        let mut repo = ConfigurationRepository::load(memory.clone());
        repo.save("b", &snapshot(&["A", "B"], None, 18.0)).unwrap();
        repo.save("a", &snapshot(&["C", "D"], None, 18.0)).unwrap();
        assert_eq!(repo.list_names(), vec![ConfigName::from("a"), ConfigName::from("b")]);

        repo.delete(&ConfigName::from("a")).unwrap();
        assert_eq!(repo.list_names(), vec![ConfigName::from("b")]);
        assert_eq!(
            ConfigurationRepository::load(memory).list_names(),
            vec![ConfigName::from("b")]
        );
    }

    #[test]
    fn test_failed_save_still_sticks_in_memory() {
        let memory = Arc::new(MemoryStore::with_quota(48));
        let mut repo = ConfigurationRepository::load(memory.clone());

        let err = repo
            .save("big", &snapshot(&["a long segment text"; 4], None, 18.0))
            .unwrap_err();
        assert!(err.is_non_fatal());
        assert!(repo.contains(&ConfigName::from("big")));
        assert!(!memory.contains(keys::CONFIGURATIONS));
    }

    #[test]
    fn test_unreadable_table_behaves_as_empty() {
        let memory = Arc::new(MemoryStore::new());
        memory.set(keys::CONFIGURATIONS, "{oops").unwrap();
        assert!(ConfigurationRepository::load(memory.clone()).list_names().is_empty());

        memory
            .set(keys::CONFIGURATIONS, r#"{"ok": {"fontSize": 12}, "bad": 7}"#)
            .unwrap();
        let repo = ConfigurationRepository::load(memory);
        assert_eq!(repo.list_names(), vec![ConfigName::from("ok")]);
        let loaded = repo
            .load_config(&ConfigName::from("ok"), Persistence::Durable)
            .unwrap();
        assert_eq!(loaded.snapshot.segments, default_segments());
        assert_eq!(loaded.snapshot.font_size.px(), 12);
    }

    #[test]
    fn test_import_non_array_segments_keeps_valid_font_size() {
        let report = import_from_text(r#"{"segments": "nope", "fontSize": 22}"#).unwrap();
        assert_eq!(report.snapshot.segments, default_segments());
        assert_eq!(report.snapshot.font_size.px(), 22);
        assert_eq!(report.fallbacks, vec![Fallback::Segments]);
    }

    #[test]
    fn test_import_rejects_non_objects() {
        for text in ["[1, 2]", "\"segments\"", "17", "null", "not json at all"] {
            assert!(
                matches!(import_from_text(text), Err(WheelError::Malformed(_))),
                "text: {text}"
            );
        }
    }

    #[test]
    fn test_import_validates_each_field_on_its_own() {
        let report = import_from_text(
            r#"{"segments": [{"text": "A"}, "B"], "capImageDataUrl": 5, "fontSize": 99}"#,
        )
        .unwrap();
        assert_eq!(
            report.snapshot,
            Snapshot {
                segments: vec![Segment::new("A", None), Segment::new("B", None)],
                cap_image: None,
                font_size: FontSize::default(),
            }
        );
        assert_eq!(
            report.fallbacks,
            vec![Fallback::CapImageDataUrl, Fallback::FontSize]
        );

        let report =
            import_from_text(r#"{"segments": [], "capImageDataUrl": "data:c", "fontSize": "20"}"#)
                .unwrap();
        assert!(report.snapshot.segments.is_empty());
        assert_eq!(report.snapshot.cap_image, Some(ImageRef::from("data:c")));
        assert_eq!(report.snapshot.font_size, FontSize::default());
        assert_eq!(report.fallbacks, vec![Fallback::FontSize]);
    }

    #[test]
    fn test_export_is_pretty_and_reimportable() {
        let original = snapshot(&["Yes", "No"], Some("data:cap"), 14.0);
        let at = Local.with_ymd_and_hms(2024, 3, 9, 17, 5, 2).unwrap();
        let file = export_at(&original, at).unwrap();

        assert_eq!(file.file_name, "pinwheel-20240309-170502.pinwheel");
        assert!(file.contents.contains("\n  \"segments\": ["));
        assert!(file.contents.contains("\"capImageDataUrl\": \"data:cap\""));

        let report = import_from_text(&file.contents).unwrap();
        assert_eq!(report.snapshot, original);
        assert!(report.fallbacks.is_empty());
    }

    #[test]
    fn test_importable_extensions() {
        assert!(is_importable(Path::new("/tmp/a.pinwheel")));
        assert!(is_importable(Path::new("b.JSON")));
        assert!(!is_importable(Path::new("c.txt")));
        assert!(!is_importable(Path::new("pinwheel")));
    }
}

use crate::error::WheelError;
use crate::storage::{SharedStore, keys, persist_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spinctl::types::ImageRef;

const DEFAULT_TEXTS: [&str; 8] = [
    "Yes!",
    "No!",
    "Maybe",
    "Ask Again",
    "Let's Try!",
    "Good Idea!",
    "Hmm...",
    "Definitely!",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub image: Option<ImageRef>,
}

impl Segment {
    pub fn new(text: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            text: text.into(),
            image,
        }
    }

    /// Lenient reading of one persisted item: a bare string is text without an image,
    /// an object contributes whatever `text`/`image` strings it has.
    fn from_value(item: &Value) -> Self {
        match item {
            Value::String(text) => Self::new(text.as_str(), None),
            Value::Object(fields) => Self {
                text: fields
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                image: fields
                    .get("image")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(ImageRef::from),
            },
            Value::Number(n) => Self::new(n.to_string(), None),
            _ => Self::new("", None),
        }
    }
}

/// A fresh copy of the built-in wheel; mutating it never affects later calls.
pub fn default_segments() -> Vec<Segment> {
    DEFAULT_TEXTS
        .iter()
        .map(|text| Segment::new(*text, None))
        .collect()
}

/// Reads a segment array, or `None` when `value` is not an array at all.
pub(crate) fn segments_from_value(value: &Value) -> Option<Vec<Segment>> {
    value
        .as_array()
        .map(|items| items.iter().map(Segment::from_value).collect())
}

/// Owner of the live segment list. Every mutation is written through as a whole; the
/// in-memory list stays authoritative when the write fails.
pub struct SegmentStore {
    store: SharedStore,
    segments: Vec<Segment>,
}

impl SegmentStore {
    pub fn load(store: SharedStore) -> Self {
        let segments = match store.get(keys::SEGMENTS) {
            Ok(Some(raw)) => Self::parse_current(&raw),
            Ok(None) => Self::migrate_legacy(&store),
            Err(e) => {
                log::warn!("Failed to read segments, using defaults: {}", e);
                default_segments()
            }
        };
        Self { store, segments }
    }

    fn parse_current(raw: &str) -> Vec<Segment> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => segments_from_value(&value)
                .filter(|segments| !segments.is_empty())
                .unwrap_or_else(default_segments),
            Err(e) => {
                log::warn!("Stored segments are not valid JSON, using defaults: {}", e);
                default_segments()
            }
        }
    }

    fn migrate_legacy(store: &SharedStore) -> Vec<Segment> {
        let raw = match store.get(keys::LEGACY_SEGMENTS) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default_segments(),
            Err(e) => {
                log::warn!("Failed to read legacy segments: {}", e);
                return default_segments();
            }
        };

        let segments = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(texts)) => texts
                .iter()
                .map(|text| match text {
                    Value::String(s) => Segment::new(s.as_str(), None),
                    other => Segment::new(other.to_string(), None),
                })
                .collect::<Vec<_>>(),
            Ok(_) => return default_segments(),
            Err(e) => {
                log::warn!("Failed to parse legacy segments: {}", e);
                return default_segments();
            }
        };

        // An empty legacy list is left in place like any other unusable entry.
        if segments.is_empty() {
            log::warn!("Legacy segments are empty, using defaults");
            return default_segments();
        }

        // The legacy entry is only dropped once the migrated list is durable.
        match persist_json(store.as_ref(), keys::SEGMENTS, &segments, "migrated segments") {
            Ok(()) => {
                if let Err(e) = store.remove(keys::LEGACY_SEGMENTS) {
                    log::warn!("Failed to remove legacy segments: {}", e);
                }
                log::info!("Migrated {} legacy segments", segments.len());
            }
            Err(e) => log::warn!("Keeping legacy segments after failed migration: {}", e),
        }
        segments
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn add(&mut self, text: &str, image: Option<ImageRef>) -> Result<(), WheelError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WheelError::Validation(
                "Please enter text for the spinner item.",
            ));
        }
        self.segments.push(Segment::new(text, image));
        self.persist()
    }

    /// Returns `Ok(false)` without touching anything when `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> Result<bool, WheelError> {
        if index >= self.segments.len() {
            return Ok(false);
        }
        self.segments.remove(index);
        self.persist().map(|()| true)
    }

    pub fn clear_image_at(&mut self, index: usize) -> Result<bool, WheelError> {
        let Some(segment) = self.segments.get_mut(index) else {
            return Ok(false);
        };
        segment.image = None;
        self.persist().map(|()| true)
    }

    /// Swaps in a whole list, optionally writing it as the current working set.
    pub fn replace(&mut self, segments: Vec<Segment>, durable: bool) -> Result<(), WheelError> {
        self.segments = segments;
        if durable { self.persist() } else { Ok(()) }
    }

    fn persist(&self) -> Result<(), WheelError> {
        persist_json(self.store.as_ref(), keys::SEGMENTS, &self.segments, "segments")
    }
}

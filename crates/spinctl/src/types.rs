use derive_more::{AsRef, Deref, Display, From, Into};
use serde::{Deserialize, Serialize};

/// Opaque reference to an image, typically a `data:` URL. Never decoded by the wheel.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct ImageRef(String);

crate::impl_string_newtype!(ImageRef);

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    Deref,
    From,
    Into,
    AsRef,
)]
#[serde(transparent)]
pub struct ConfigName(String);

crate::impl_string_newtype!(ConfigName);

impl ConfigName {
    /// Trims surrounding whitespace, rejecting names that end up empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self::new(trimmed))
    }

    /// The same name with surrounding whitespace removed, as `parse` would store it.
    pub fn trimmed(&self) -> Self {
        Self::new(self.0.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_name_is_trimmed() {
        assert_eq!(ConfigName::parse("  party night "), Some(ConfigName::from("party night")));
        assert_eq!(ConfigName::parse("   "), None);
        assert_eq!(ConfigName::parse(""), None);
        assert_eq!(ConfigName::from(" party ").trimmed(), ConfigName::from("party"));
    }

    #[test]
    fn test_image_ref_serializes_as_plain_string() {
        let image = ImageRef::from("data:image/png;base64,AAAA");
        assert_eq!(image.as_str(), "data:image/png;base64,AAAA");
        assert_eq!(image.to_string(), "data:image/png;base64,AAAA");
    }
}

use crate::error::WheelError;
use crate::storage::{SharedStore, keys};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use spinctl::types::ImageRef;

pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 30;
pub const DEFAULT_FONT_SIZE: u32 = 18;

/// Segment label size in pixels, always within `MIN_FONT_SIZE..=MAX_FONT_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
#[display("{_0}px")]
pub struct FontSize(u32);

impl Default for FontSize {
    fn default() -> Self {
        Self(DEFAULT_FONT_SIZE)
    }
}

impl FontSize {
    /// `None` unless `px` is a finite value inside the allowed range. Fractions are dropped.
    pub fn checked(px: f64) -> Option<Self> {
        (px.is_finite() && (MIN_FONT_SIZE as f64..=MAX_FONT_SIZE as f64).contains(&px))
            .then(|| Self(px.trunc() as u32))
    }

    /// Out-of-range sizes are replaced by the default rather than clamped to the nearest bound.
    pub fn or_default(px: f64) -> Self {
        Self::checked(px).unwrap_or_default()
    }

    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<f64>()
            .map(Self::or_default)
            .unwrap_or_default()
    }

    pub fn px(self) -> u32 {
        self.0
    }
}

/// Cosmetic state kept next to the segments: the cap overlay and the label size.
pub struct Appearance {
    store: SharedStore,
    cap_image: Option<ImageRef>,
    font_size: FontSize,
}

impl Appearance {
    pub fn load(store: SharedStore) -> Self {
        let cap_image = match store.get(keys::CAP_IMAGE) {
            Ok(value) => value.filter(|s| !s.is_empty()).map(ImageRef::new),
            Err(e) => {
                log::warn!("Failed to read cap image: {}", e);
                None
            }
        };
        let font_size = match store.get(keys::FONT_SIZE) {
            Ok(value) => value.as_deref().map(FontSize::parse).unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to read font size: {}", e);
                FontSize::default()
            }
        };
        Self {
            store,
            cap_image,
            font_size,
        }
    }

    pub fn cap_image(&self) -> Option<&ImageRef> {
        self.cap_image.as_ref()
    }

    pub fn font_size(&self) -> FontSize {
        self.font_size
    }

    pub fn set_cap_image(&mut self, image: Option<ImageRef>) -> Result<(), WheelError> {
        self.cap_image = image;
        self.persist_cap_image()
    }

    pub fn set_font_size(&mut self, size: FontSize) -> Result<(), WheelError> {
        self.font_size = size;
        self.persist_font_size()
    }

    /// Applies both values at once, writing them through only when `durable`.
    pub fn replace(
        &mut self,
        cap_image: Option<ImageRef>,
        font_size: FontSize,
        durable: bool,
    ) -> Result<(), WheelError> {
        self.cap_image = cap_image;
        self.font_size = font_size;
        if !durable {
            return Ok(());
        }
        // Both writes are attempted even if the first fails.
        let cap = self.persist_cap_image();
        let font = self.persist_font_size();
        cap.and(font)
    }

    fn persist_cap_image(&self) -> Result<(), WheelError> {
        let result = match &self.cap_image {
            Some(image) => self.store.set(keys::CAP_IMAGE, image.as_str()),
            None => self.store.remove(keys::CAP_IMAGE),
        };
        result.map_err(|source| {
            log::warn!("Failed to persist cap image: {}", source);
            WheelError::StorageQuota {
                what: "cap image",
                source,
            }
        })
    }

    fn persist_font_size(&self) -> Result<(), WheelError> {
        self.store
            .set(keys::FONT_SIZE, &self.font_size.px().to_string())
            .map_err(|source| {
                log::warn!("Failed to persist font size: {}", source);
                WheelError::StorageQuota {
                    what: "font size",
                    source,
                }
            })
    }
}

use crate::segments::Segment;
use crate::spin::{FULL_TURN, MIN_SPINNABLE_SEGMENTS, segment_angle};
use palette::Srgb;
use serde::{Deserialize, Serialize};

/// Segment colours, assigned by position and repeated when there are more segments.
pub const PALETTE: [Srgb<u8>; 15] = [
    Srgb::new(0xFF, 0x6B, 0x6B),
    Srgb::new(0xFF, 0xD1, 0x66),
    Srgb::new(0x06, 0xD6, 0xA0),
    Srgb::new(0x11, 0x8A, 0xB2),
    Srgb::new(0xE7, 0x6F, 0x51),
    Srgb::new(0xF4, 0xA2, 0x61),
    Srgb::new(0xE9, 0xC4, 0x6A),
    Srgb::new(0x2A, 0x9D, 0x8F),
    Srgb::new(0x26, 0x46, 0x53),
    Srgb::new(0xF7, 0xA0, 0x72),
    Srgb::new(0xED, 0x6A, 0x5A),
    Srgb::new(0xF8, 0xE1, 0x6C),
    Srgb::new(0x08, 0xA0, 0x45),
    Srgb::new(0x1E, 0x96, 0xFC),
    Srgb::new(0xAF, 0x2B, 0xBF),
];

pub const DEFAULT_WHEEL_WIDTH: f64 = 340.0;
/// Widens each face slightly so neighbouring faces overlap instead of leaving seams.
pub const DEFAULT_WIDTH_OVERLAP: f64 = 1.01;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub wheel_width: f64,
    pub width_overlap: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            wheel_width: DEFAULT_WHEEL_WIDTH,
            width_overlap: DEFAULT_WIDTH_OVERLAP,
        }
    }
}

pub fn segment_color(index: usize) -> Srgb<u8> {
    PALETTE[index % PALETTE.len()]
}

fn hex(color: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentLayout {
    pub index: usize,
    pub text: String,
    pub has_image: bool,
    /// Angle of the face around the wheel axis, in degrees.
    pub rotation: f64,
    pub width: f64,
    pub color: String,
}

/// Everything a renderer needs to place the faces of the wheel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WheelLayout {
    pub segment_angle: f64,
    pub radius: f64,
    pub segments: Vec<SegmentLayout>,
}

impl WheelLayout {
    pub fn calculate(segments: &[Segment], settings: &LayoutSettings) -> Self {
        if segments.len() < MIN_SPINNABLE_SEGMENTS || settings.wheel_width <= 0.0 {
            return Self::placeholder();
        }

        let angle = segment_angle(segments.len());
        let radius = settings.wheel_width / 2.0;
        // faces are flat, so each one spans the chord of its arc
        let width = 2.0 * radius * (angle / 2.0).to_radians().tan() * settings.width_overlap;

        let segments = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| SegmentLayout {
                index,
                text: segment.text.clone(),
                has_image: segment.image.is_some(),
                rotation: (angle * index as f64) % FULL_TURN,
                width,
                color: hex(segment_color(index)),
            })
            .collect();

        Self {
            segment_angle: angle,
            radius,
            segments,
        }
    }

    /// Shown while there are too few segments to spin.
    pub fn placeholder() -> Self {
        Self {
            segment_angle: 0.0,
            radius: 0.0,
            segments: Vec::new(),
        }
    }

    pub fn is_spinnable(&self) -> bool {
        !self.segments.is_empty()
    }
}

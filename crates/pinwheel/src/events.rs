use crate::appearance::FontSize;
use crate::layout::WheelLayout;
use crate::spin::SpinOutcome;
use serde::Serialize;
use spinctl::protocol::Command;
use spinctl::types::{ConfigName, ImageRef};
use strum::Display as StrumDisplay;

/// Everything the wheel task reacts to.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    /// Sent by a presenter when the animation of `spin` ran to its end.
    AnimationFinished { spin: u64 },
    QuietWindowElapsed(u64),
    SettingsReload,
}

impl From<Command> for AppEvent {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, StrumDisplay)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Everything the wheel tells the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WheelEvent {
    SegmentsChanged {
        layout: WheelLayout,
    },
    SpinRequested {
        spin: u64,
        target_rotation: f64,
        duration_ms: u64,
    },
    /// The spin was interrupted; hold the wheel at `rotation` until the reset follows.
    SpinFrozen {
        spin: u64,
        rotation: f64,
    },
    SpinResolved {
        spin: u64,
        #[serde(flatten)]
        outcome: SpinOutcome,
    },
    ConfigurationListChanged {
        names: Vec<ConfigName>,
    },
    AppearanceChanged {
        cap_image: Option<ImageRef>,
        font_size: FontSize,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

use std::time::Duration;

pub mod engine;
pub mod resolve;

pub use engine::{
    RandSource, SpinEngine, SpinOutcome, SpinPhase, SpinRequest, SpinSource, SpinTuning,
};
pub use resolve::{resolve, segment_angle};

pub const FULL_TURN: f64 = 360.0;
pub const MIN_SPINNABLE_SEGMENTS: usize = 2;

// Cosmetic tuning; overridable through settings.
pub const DEFAULT_MIN_CYCLES: u32 = 10;
pub const DEFAULT_CYCLE_SPAN: u32 = 8; // cycles drawn from 10..=17
pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_secs(6);

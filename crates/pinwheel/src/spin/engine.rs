use super::{
    DEFAULT_CYCLE_SPAN, DEFAULT_MIN_CYCLES, DEFAULT_SPIN_DURATION, FULL_TURN,
    MIN_SPINNABLE_SEGMENTS, resolve,
};
use crate::segments::Segment;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;

/// Source of uniform draws in `[0, 1)`; the only randomness a spin uses.
pub trait SpinSource: Send {
    fn next_unit(&mut self) -> f64;
}

pub struct RandSource {
    rng: StdRng,
}

impl RandSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandSource {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl SpinSource for RandSource {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinTuning {
    pub min_cycles: u32,
    pub cycle_span: u32,
    pub duration: Duration,
}

impl Default for SpinTuning {
    fn default() -> Self {
        Self {
            min_cycles: DEFAULT_MIN_CYCLES,
            cycle_span: DEFAULT_CYCLE_SPAN,
            duration: DEFAULT_SPIN_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpinPhase {
    Idle,
    Spinning { spin: u64, target: f64 },
    /// Interrupted mid-flight; natural completion no longer counts and only a forced
    /// reset leaves this state.
    Frozen { spin: u64, at: f64 },
}

/// Issued to the presentation layer: animate forward to `target_rotation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinRequest {
    pub spin: u64,
    pub target_rotation: f64,
    pub cycles: u32,
    pub extra_angle: f64,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpinOutcome {
    Winner { index: usize, segment: Segment },
    Interrupted { frozen_at: f64 },
    /// The list shrank below two segments while the wheel was turning.
    Error { segment_count: usize },
}

pub struct SpinEngine {
    phase: SpinPhase,
    cumulative_rotation: f64,
    winner: Option<usize>,
    spins: u64,
    tuning: SpinTuning,
    source: Box<dyn SpinSource>,
}

impl SpinEngine {
    pub fn new(tuning: SpinTuning, source: Box<dyn SpinSource>) -> Self {
        Self {
            phase: SpinPhase::Idle,
            cumulative_rotation: 0.0,
            winner: None,
            spins: 0,
            tuning,
            source,
        }
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    /// True from an accepted request until the spin is resolved or forcibly reset.
    pub fn is_spinning(&self) -> bool {
        !matches!(self.phase, SpinPhase::Idle)
    }

    pub fn cumulative_rotation(&self) -> f64 {
        self.cumulative_rotation
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn current_spin(&self) -> Option<u64> {
        match self.phase {
            SpinPhase::Idle => None,
            SpinPhase::Spinning { spin, .. } | SpinPhase::Frozen { spin, .. } => Some(spin),
        }
    }

    pub fn tuning(&self) -> SpinTuning {
        self.tuning
    }

    pub fn set_tuning(&mut self, tuning: SpinTuning) {
        self.tuning = tuning;
    }

    pub fn request_spin(&mut self, segment_count: usize) -> Option<SpinRequest> {
        if self.is_spinning() || segment_count < MIN_SPINNABLE_SEGMENTS {
            return None;
        }

        let extra_angle = self.source.next_unit() * FULL_TURN;
        let span = self.tuning.cycle_span.max(1);
        let drawn = (self.source.next_unit() * span as f64).floor() as u32;
        let cycles = self.tuning.min_cycles.saturating_add(drawn.min(span - 1));

        let target_rotation = self.cumulative_rotation + cycles as f64 * FULL_TURN + extra_angle;
        self.cumulative_rotation = target_rotation;
        self.winner = None;
        self.spins += 1;
        self.phase = SpinPhase::Spinning {
            spin: self.spins,
            target: target_rotation,
        };

        Some(SpinRequest {
            spin: self.spins,
            target_rotation,
            cycles,
            extra_angle,
            duration: self.tuning.duration,
        })
    }

    /// Natural end of the animation. Signals for another spin (`Some(id)` not matching the
    /// spin in flight) or arriving while not spinning are ignored.
    pub fn complete(&mut self, spin: Option<u64>, segments: &[Segment]) -> Option<SpinOutcome> {
        let SpinPhase::Spinning {
            spin: current,
            target,
        } = self.phase
        else {
            log::debug!("Ignoring animation end while {:?}", self.phase);
            return None;
        };
        if spin.is_some_and(|id| id != current) {
            log::debug!("Ignoring animation end of stale spin {:?}", spin);
            return None;
        }

        self.phase = SpinPhase::Idle;
        if segments.len() < MIN_SPINNABLE_SEGMENTS {
            log::error!(
                "Could not determine a winner: {} segments left at rotation {}",
                segments.len(),
                target
            );
            return Some(SpinOutcome::Error {
                segment_count: segments.len(),
            });
        }

        let outcome = resolve(target, segments.len())
            .and_then(|index| segments.get(index).map(|segment| (index, segment)))
            .map(|(index, segment)| {
                self.winner = Some(index);
                SpinOutcome::Winner {
                    index,
                    segment: segment.clone(),
                }
            });
        outcome.or(Some(SpinOutcome::Error {
            segment_count: segments.len(),
        }))
    }

    /// Stops honouring natural completion and pins the rotation to what is on screen
    /// (`displayed`, or the target when the presenter cannot tell). Returns the frozen
    /// rotation the first time a spin is frozen.
    pub fn freeze(&mut self, displayed: Option<f64>) -> Option<f64> {
        let SpinPhase::Spinning { spin, target } = self.phase else {
            return None;
        };
        let at = displayed.unwrap_or(target);
        self.phase = SpinPhase::Frozen { spin, at };
        self.cumulative_rotation = at;
        Some(at)
    }

    /// Ends an interrupted (or still running) spin without a winner.
    pub fn force_idle(&mut self) -> Option<SpinOutcome> {
        let frozen_at = match self.phase {
            SpinPhase::Idle => return None,
            SpinPhase::Spinning { target, .. } => target,
            SpinPhase::Frozen { at, .. } => at,
        };
        self.phase = SpinPhase::Idle;
        self.winner = None;
        Some(SpinOutcome::Interrupted { frozen_at })
    }

    /// Called whenever the wheel is rebuilt. A spin in flight keeps its rotation and
    /// resolves against the new list.
    pub fn reset(&mut self) {
        self.winner = None;
        if !self.is_spinning() {
            self.cumulative_rotation = 0.0;
        }
    }
}

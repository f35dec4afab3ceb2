use crate::events::{AppEvent, WheelEvent};
use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Control points of the `cubic-bezier(0.25, 0.1, 0.25, 1)` spin curve.
const EASE: (f64, f64, f64, f64) = (0.25, 0.1, 0.25, 1.0);

/// What the wheel asks of whatever draws it: where the wheel is right now.
pub trait RotationProbe: Send + Sync {
    fn displayed_rotation(&self) -> Option<f64>;
}

fn bezier(t: f64, p1: f64, p2: f64) -> f64 {
    let u = 1.0 - t;
    3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
}

/// Eased progress for linear progress `x` in `[0, 1]`.
pub fn ease(x: f64) -> f64 {
    let (x1, y1, x2, y2) = EASE;
    let x = x.clamp(0.0, 1.0);

    // x(t) is monotonic for these control points
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..48 {
        let mid = (lo + hi) / 2.0;
        if bezier(mid, x1, x2) < x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    bezier((lo + hi) / 2.0, y1, y2)
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    from: f64,
    to: f64,
    started: Instant,
    duration: Duration,
}

impl Animation {
    fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        self.started.elapsed().as_secs_f64() / self.duration.as_secs_f64()
    }

    fn rotation(&self) -> f64 {
        self.from + (self.to - self.from) * ease(self.progress())
    }
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Resting(f64),
    Animating(Animation),
    Frozen(f64),
}

impl Clock {
    fn rotation(&self) -> f64 {
        match self {
            Clock::Resting(at) | Clock::Frozen(at) => *at,
            Clock::Animating(animation) => animation.rotation(),
        }
    }
}

/// Stand-in for an animation layer. It keeps track of the rotation a renderer would be
/// showing, reports the end of each animation and prints every wheel event as a JSON line.
#[derive(Clone)]
pub struct HeadlessPresenter {
    clock: Arc<Mutex<Clock>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    tx: Sender<AppEvent>,
}

impl HeadlessPresenter {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self {
            clock: Arc::new(Mutex::new(Clock::Resting(0.0))),
            timer: Arc::new(Mutex::new(None)),
            tx,
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(*self.clock.lock(), Clock::Animating(_))
    }

    /// Must run inside a tokio runtime.
    pub fn handle(&self, event: &WheelEvent) {
        match event {
            WheelEvent::SpinRequested {
                spin,
                target_rotation,
                duration_ms,
            } => self.animate(*spin, *target_rotation, Duration::from_millis(*duration_ms)),
            WheelEvent::SpinFrozen { rotation, .. } => {
                self.stop_timer();
                *self.clock.lock() = Clock::Frozen(*rotation);
            }
            WheelEvent::SegmentsChanged { .. } => {
                let mut clock = self.clock.lock();
                let in_flight = matches!(*clock, Clock::Animating(a) if a.progress() < 1.0);
                if !in_flight {
                    *clock = Clock::Resting(0.0);
                }
            }
            _ => {}
        }
    }

    fn animate(&self, spin: u64, to: f64, duration: Duration) {
        self.stop_timer();
        {
            let mut clock = self.clock.lock();
            let from = clock.rotation();
            *clock = Clock::Animating(Animation {
                from,
                to,
                started: Instant::now(),
                duration,
            });
        }

        let clock = self.clock.clone();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            *clock.lock() = Clock::Resting(to);
            let _ = tx.send(AppEvent::AnimationFinished { spin }).await;
        });
        *self.timer.lock() = Some(handle);
    }

    fn stop_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }

    pub async fn run(self, rx: Receiver<WheelEvent>) {
        while let Ok(event) = rx.recv().await {
            self.handle(&event);
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("Failed to encode event: {}", e),
            }
        }
    }
}

impl RotationProbe for HeadlessPresenter {
    fn displayed_rotation(&self) -> Option<f64> {
        Some(self.clock.lock().rotation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_endpoints_and_shape() {
        assert!(ease(0.0).abs() < 1e-9);
        assert!((ease(1.0) - 1.0).abs() < 1e-9);
        assert!((ease(-3.0)).abs() < 1e-9);
        // ease curve runs ahead of linear time
        assert!(ease(0.5) > 0.7);
        let mut previous = 0.0;
        for step in 1..=20 {
            let y = ease(step as f64 / 20.0);
            assert!(y >= previous);
            previous = y;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_animation_reports_its_end() {
        let (tx, rx) = async_channel::unbounded();
        let presenter = HeadlessPresenter::new(tx);

        presenter.handle(&WheelEvent::SpinRequested {
            spin: 4,
            target_rotation: 3600.0,
            duration_ms: 6000,
        });
        assert!(presenter.is_animating());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let midway = presenter.displayed_rotation().unwrap();
        assert!(midway > 1800.0 && midway < 3600.0, "{midway}");
        assert!(rx.is_empty());

        match rx.recv().await.unwrap() {
            AppEvent::AnimationFinished { spin } => assert_eq!(spin, 4),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(presenter.displayed_rotation(), Some(3600.0));
        assert!(!presenter.is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_animation_never_finishes() {
        let (tx, rx) = async_channel::unbounded();
        let presenter = HeadlessPresenter::new(tx);

        presenter.handle(&WheelEvent::SpinRequested {
            spin: 1,
            target_rotation: 4000.0,
            duration_ms: 6000,
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        presenter.handle(&WheelEvent::SpinFrozen {
            spin: 1,
            rotation: 1234.0,
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.is_empty());
        assert_eq!(presenter.displayed_rotation(), Some(1234.0));

        presenter.handle(&WheelEvent::SegmentsChanged {
            layout: crate::layout::WheelLayout::placeholder(),
        });
        assert_eq!(presenter.displayed_rotation(), Some(0.0));
    }
}

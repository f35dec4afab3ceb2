use crate::events::AppEvent;
use async_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::time::Duration;
use strum::{Display as StrumDisplay, EnumIter, EnumString};
use tokio::task::JoinHandle;

pub const DEFAULT_SCROLL_QUIET: Duration = Duration::from_millis(100);
pub const DEFAULT_RESIZE_QUIET: Duration = Duration::from_millis(250);

/// External events that disturb the wheel's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Disruption {
    Scroll,
    Resize,
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuietWindows {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "scroll_quiet_ms")]
    pub scroll: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "resize_quiet_ms")]
    pub resize: Duration,
}

impl Default for QuietWindows {
    fn default() -> Self {
        Self {
            scroll: DEFAULT_SCROLL_QUIET,
            resize: DEFAULT_RESIZE_QUIET,
        }
    }
}

impl QuietWindows {
    pub fn for_kind(&self, kind: Disruption) -> Duration {
        match kind {
            Disruption::Scroll => self.scroll,
            Disruption::Resize => self.resize,
        }
    }
}

struct Pending {
    generation: u64,
    kind: Disruption,
    timer: JoinHandle<()>,
}

/// Debounces disruptions. Each accepted disruption cancels the pending timer before
/// arming a new one, so at most one `QuietWindowElapsed` can be outstanding, and a
/// generation number guards against a timer that fired just before it was cancelled.
pub struct InterruptionPolicy {
    windows: QuietWindows,
    generation: u64,
    pending: Option<Pending>,
    tx: Sender<AppEvent>,
}

impl InterruptionPolicy {
    pub fn new(windows: QuietWindows, tx: Sender<AppEvent>) -> Self {
        Self {
            windows,
            generation: 0,
            pending: None,
            tx,
        }
    }

    pub fn set_windows(&mut self, windows: QuietWindows) {
        self.windows = windows;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arms (or re-arms) the quiet window. Scrolling only matters while a spin is in
    /// flight and never touches a pending window otherwise; a resize always leads to a
    /// layout refresh. Must run inside a tokio runtime.
    pub fn on_disruption(&mut self, kind: Disruption, spinning: bool) -> bool {
        if kind == Disruption::Scroll && !spinning {
            return false;
        }

        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let quiet = self.windows.for_kind(kind);
        let tx = self.tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send(AppEvent::QuietWindowElapsed(generation)).await;
        });

        log::debug!("{} disruption, quiet window {:?}", kind, quiet);
        self.pending = Some(Pending {
            generation,
            kind,
            timer,
        });
        true
    }

    /// Claims the elapsed window if `generation` is the one currently armed.
    pub fn take_elapsed(&mut self, generation: u64) -> Option<Disruption> {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
        {
            return self.pending.take().map(|p| p.kind);
        }
        log::debug!("Ignoring stale quiet window {}", generation);
        None
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
    }
}

impl Drop for InterruptionPolicy {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> (InterruptionPolicy, async_channel::Receiver<AppEvent>) {
        let (tx, rx) = async_channel::unbounded();
        (InterruptionPolicy::new(QuietWindows::default(), tx), rx)
    }

    async fn next_generation(rx: &async_channel::Receiver<AppEvent>) -> u64 {
        match rx.recv().await.unwrap() {
            AppEvent::QuietWindowElapsed(generation) => generation,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_while_idle_is_ignored() {
        let (mut policy, rx) = policy();
        assert!(!policy.on_disruption(Disruption::Scroll, false));
        assert!(!policy.is_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_scroll_leaves_pending_resize_alone() {
        let (mut policy, rx) = policy();
        let start = tokio::time::Instant::now();
        assert!(policy.on_disruption(Disruption::Resize, false));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!policy.on_disruption(Disruption::Scroll, false));
        assert!(policy.is_pending());

        let generation = next_generation(&rx).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
        assert_eq!(policy.take_elapsed(generation), Some(Disruption::Resize));
        assert!(rx.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_scrolls_collapse_into_one_window() {
        let (mut policy, rx) = policy();
        let start = tokio::time::Instant::now();

        for _ in 0..5 {
            assert!(policy.on_disruption(Disruption::Scroll, true));
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        assert!(rx.is_empty());

        let generation = next_generation(&rx).await;
        // last scroll at 240ms + 100ms quiet window
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(340), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
        assert_eq!(policy.take_elapsed(generation), Some(Disruption::Scroll));
        assert!(!policy.is_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_not_claimed() {
        let (mut policy, _rx) = policy();
        policy.on_disruption(Disruption::Resize, false);
        policy.on_disruption(Disruption::Resize, false);

        assert_eq!(policy.take_elapsed(1), None);
        assert!(policy.is_pending());
        assert_eq!(policy.take_elapsed(2), Some(Disruption::Resize));
        assert_eq!(policy.take_elapsed(2), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_uses_its_own_window() {
        let (mut policy, rx) = policy();
        let start = tokio::time::Instant::now();
        policy.on_disruption(Disruption::Resize, false);

        let generation = next_generation(&rx).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
        assert_eq!(policy.take_elapsed(generation), Some(Disruption::Resize));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_silences_the_timer() {
        let (mut policy, rx) = policy();
        policy.on_disruption(Disruption::Scroll, true);
        policy.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.is_empty());
    }
}

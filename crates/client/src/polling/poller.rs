//! Visibility-aware interval poller
//!
//! Runs a callback once on activation and then every `interval`, with these
//! rules:
//! - a scheduled tick while the surface is hidden is skipped, not deferred
//! - a tick that arrives while the previous invocation is still pending is
//!   skipped (at most one invocation in flight per poller)
//! - a hidden → visible transition triggers one extra invocation, subject to
//!   the same in-flight rule
//! - the callback is read through an always-current slot, so replacing it
//!   never restarts the schedule
//!
//! Invocations run on their own task. A failing or panicking callback is
//! logged and the in-flight flag is released on every exit path.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::visibility::VisibilityWatch;

/// Type-erased poll callback
pub type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Schedule parameters; changing any field restarts the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerOptions {
    pub interval: Duration,
    pub enabled: bool,
    /// Extra dependency: bump it to force a restart with the same interval
    pub restart_key: u64,
}

impl PollerOptions {
    /// Enabled schedule with the given interval
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            restart_key: 0,
        }
    }

    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            enabled: false,
            restart_key: 0,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_restart_key(mut self, restart_key: u64) -> Self {
        self.restart_key = restart_key;
        self
    }

    /// Whether these options describe a running schedule
    pub fn is_active(&self) -> bool {
        self.enabled && !self.interval.is_zero()
    }
}

/// Managed repeating execution of a callback
pub struct Poller {
    name: &'static str,
    callback: Arc<RwLock<PollCallback>>,
    running: Arc<AtomicBool>,
    visibility: VisibilityWatch,
    options: Option<PollerOptions>,
    schedule: Option<JoinHandle<()>>,
}

impl Poller {
    /// Create an inactive poller; call [`Poller::start`] to activate it
    pub fn new<F, Fut>(
        name: &'static str,
        visibility: VisibilityWatch,
        callback: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name,
            callback: Arc::new(RwLock::new(erase(callback))),
            running: Arc::new(AtomicBool::new(false)),
            visibility,
            options: None,
            schedule: None,
        }
    }

    /// Replace the callback used by every future invocation
    ///
    /// Does not restart the schedule or trigger an invocation.
    pub fn set_callback<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut slot = self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = erase(callback);
    }

    /// Activate with the given options (same as [`Poller::update`])
    pub fn start(&mut self, options: PollerOptions) {
        self.update(options);
    }

    /// Apply new options
    ///
    /// Unchanged options are a no-op, so calling this on every state change
    /// never adds invocations. Changed options tear the old schedule down
    /// and, if the new options are active, start a fresh one.
    pub fn update(&mut self, options: PollerOptions) {
        if self.options == Some(options) {
            return;
        }

        self.cancel_schedule();
        self.options = Some(options);

        if !options.is_active() {
            tracing::debug!(poller = self.name, "Poller inactive");
            return;
        }

        tracing::debug!(
            poller = self.name,
            interval_ms = options.interval.as_millis() as u64,
            "Poller started"
        );

        self.schedule = Some(tokio::spawn(run_schedule(
            self.name,
            options.interval,
            Arc::clone(&self.callback),
            Arc::clone(&self.running),
            self.visibility.clone(),
        )));
    }

    /// Deactivate: the timer and the visibility listener are gone on return
    ///
    /// An invocation already in flight is allowed to finish.
    pub fn stop(&mut self) {
        self.options = None;
        if self.cancel_schedule() {
            tracing::debug!(poller = self.name, "Poller stopped");
        }
    }

    /// Whether a schedule is currently active
    pub fn is_active(&self) -> bool {
        self.schedule.is_some()
    }

    /// Whether an invocation is currently in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn options(&self) -> Option<PollerOptions> {
        self.options
    }

    fn cancel_schedule(&mut self) -> bool {
        match self.schedule.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel_schedule();
    }
}

fn erase<F, Fut>(callback: F) -> PollCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || callback().boxed())
}

/// Holds the in-flight flag; dropping it (including during unwinding)
/// releases the flag
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawn one invocation of the latest callback unless one is in flight
fn invoke(name: &'static str, callback: &RwLock<PollCallback>, running: &Arc<AtomicBool>) {
    let Some(guard) = RunningGuard::acquire(running) else {
        tracing::trace!(poller = name, "Previous invocation pending, skipping");
        return;
    };

    let callback = callback
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = callback().await {
            tracing::debug!(poller = name, error = %e, "Poll callback failed");
        }
    });
}

async fn run_schedule(
    name: &'static str,
    interval: Duration,
    callback: Arc<RwLock<PollCallback>>,
    running: Arc<AtomicBool>,
    mut visibility: VisibilityWatch,
) {
    invoke(name, &callback, &running);

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reveals = visibility.borrow_and_update().reveals;
    let mut watching = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !visibility.borrow().visibility.is_visible() {
                    tracing::trace!(poller = name, "Hidden, skipping tick");
                    continue;
                }
                invoke(name, &callback, &running);
            }
            changed = visibility.changed(), if watching => {
                if changed.is_err() {
                    // Source dropped: keep ticking with the last known state
                    watching = false;
                    continue;
                }
                let now = *visibility.borrow_and_update();
                // Compare reveal counts, not states: a hide-then-show that
                // landed between two wakeups still counts
                if now.reveals != reveals && now.visibility.is_visible() {
                    tracing::trace!(poller = name, "Visible again, refreshing");
                    invoke(name, &callback, &running);
                }
                reveals = now.reveals;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::visibility::{Visibility, VisibilitySource};
    use std::sync::atomic::AtomicUsize;

    const INTERVAL: Duration = Duration::from_secs(15);

    fn counter_poller(source: &VisibilitySource) -> (Poller, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let poller = Poller::new("test", source.subscribe(), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (poller, count)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_then_interval() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Re-applying identical options must not add invocations
        for _ in 0..5 {
            poller.update(PollerOptions::every(INTERVAL));
        }
        advance(14_998).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        advance(2).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        advance(15_000).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_ticks_skipped_and_visible_refreshes() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        source.set(Visibility::Hidden);
        advance(40_000).await;
        assert_eq!(count.load(Ordering::SeqCst), 1, "hidden ticks must be skipped");

        source.set(Visibility::Visible);
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 2, "regaining visibility refreshes");

        // Skipped ticks are not replayed; the next regular tick is at 45s
        advance(4_000).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        advance(1_000).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_ticks_skipped() {
        let source = VisibilitySource::default();
        let started = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&started);
        let mut poller = Poller::new("slow", source.subscribe(), move || {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(40)).await;
                Ok(())
            }
        });

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert!(poller.is_running());

        // Ticks at 15s and 30s land while the first call is pending
        advance(43_000).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());

        // The 45s tick runs normally
        advance(2_000).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_refresh_respects_in_flight_guard() {
        let source = VisibilitySource::default();
        let started = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&started);
        let mut poller = Poller::new("slow", source.subscribe(), move || {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
        });

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        source.set(Visibility::Hidden);
        advance(1).await;
        source.set(Visibility::Visible);
        advance(1).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_hide_and_show_still_refreshes() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Both reports land before the schedule task wakes up
        source.set(Visibility::Hidden);
        source.set(Visibility::Visible);
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_callback_releases_guard() {
        let source = VisibilitySource::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let mut poller = Poller::new("flaky", source.subscribe(), move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("network down");
                }
                Ok(())
            }
        });

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());

        advance(15_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_releases_guard() {
        let source = VisibilitySource::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let mut poller = Poller::new("panicky", source.subscribe(), move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("callback blew up");
                }
                Ok(())
            }
        });

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert!(!poller.is_running());
        assert!(poller.is_active());

        advance(15_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_timer() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        poller.update(PollerOptions::every(INTERVAL).with_enabled(false));
        assert!(!poller.is_active());

        advance(120_000).await;
        source.set(Visibility::Hidden);
        source.set(Visibility::Visible);
        advance(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_clears_timer() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        drop(poller);

        advance(60_000).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_options_never_invoke() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::disabled());
        poller.update(PollerOptions::every(Duration::ZERO));
        advance(60_000).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_callback_used_without_restart() {
        let source = VisibilitySource::default();
        let (mut poller, first) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;

        let second = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&second);
        poller.set_callback(move || {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        advance(1).await;
        assert_eq!(second.load(Ordering::SeqCst), 0, "swapping must not invoke");

        advance(15_000).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_key_restarts_schedule() {
        let source = VisibilitySource::default();
        let (mut poller, count) = counter_poller(&source);

        poller.start(PollerOptions::every(INTERVAL));
        advance(1).await;
        poller.update(PollerOptions::every(INTERVAL).with_restart_key(1));
        advance(1).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

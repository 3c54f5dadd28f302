//! Bridge-side timer wrappers.
//!
//! The host schedules and fires timers; the handle forwards "run" and
//! shutdown events into the extension's [`TimerHooks`]. A faulting run hook
//! cancels that timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::extension::lifecycle::ActiveSet;
use crate::extension::system::HookResult;
use crate::host::{HostTimerId, InstanceId, TimerHost};

/// Timer callbacks an extension may override.
#[async_trait::async_trait]
pub trait TimerHooks: Send + Sync {
    /// The timer fired.
    async fn run(&mut self) -> HookResult {
        Ok(())
    }

    /// The timer is going away (cancelled, cycles exhausted, or unload).
    async fn on_shutdown(&mut self) -> HookResult {
        Ok(())
    }
}

/// Bridge-side wrapper around a host timer resource.
pub struct TimerHandle {
    owner: InstanceId,
    host_id: HostTimerId,
    label: String,
    description: String,
    interval: Duration,
    cycles: u32,
    host: Arc<dyn TimerHost>,
    registry: Weak<ActiveSet>,
    hooks: tokio::sync::Mutex<Box<dyn TimerHooks>>,
    cancelled: AtomicBool,
}

impl TimerHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        owner: InstanceId,
        host_id: HostTimerId,
        label: String,
        description: String,
        interval: Duration,
        cycles: u32,
        host: Arc<dyn TimerHost>,
        registry: Weak<ActiveSet>,
        hooks: Box<dyn TimerHooks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            owner,
            host_id,
            label,
            description,
            interval,
            cycles,
            host,
            registry,
            hooks: tokio::sync::Mutex::new(hooks),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn host_id(&self) -> HostTimerId {
        self.host_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Remaining-cycles configuration; 0 means run until cancelled.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn is_live(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.contains(self.owner))
            .unwrap_or(false)
    }

    /// Stop the timer at the host. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.host.cancel(self.host_id);
        }
    }

    /// The host reports a tick. Suppressed after cancellation or once the
    /// owning instance's unload has begun; a faulting hook cancels the
    /// timer.
    pub async fn fire(&self) {
        if self.is_cancelled() || !self.is_live() {
            return;
        }
        if let Err(e) = self.hooks.lock().await.run().await {
            tracing::warn!(timer = %self.label, error = %e, "timer hook failed, cancelling timer");
            self.cancel();
        }
    }

    /// The host reports the timer is done (cycles exhausted or host
    /// shutdown). Runs the shutdown hook best-effort.
    pub async fn shutdown(&self) {
        if let Err(e) = self.hooks.lock().await.on_shutdown().await {
            tracing::warn!(timer = %self.label, error = %e, "timer shutdown hook failed");
        }
        self.cancelled.store(true, Ordering::Release);
    }

    /// Teardown path used at unload: shutdown hook, then cancel at the
    /// host.
    pub(crate) async fn shutdown_and_cancel(&self) {
        if self.is_cancelled() {
            return;
        }
        if let Err(e) = self.hooks.lock().await.on_shutdown().await {
            tracing::warn!(timer = %self.label, error = %e, "timer shutdown hook failed");
        }
        self.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("owner", &self.owner)
            .field("label", &self.label)
            .field("interval", &self.interval)
            .field("cycles", &self.cycles)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

//! Polling supervisor for outstanding downstream builds.
//!
//! Single-threaded sequential polling: each pass queries every still-active
//! build in turn, reports status-text changes through the [`StatusListener`]
//! seam, drops terminal builds from the active set, and sleeps between
//! passes via the pluggable [`Clock`]. Detection is kept separate from
//! effects (abort, artifact fetch) so the state machine is testable without
//! network collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use router_api::{Build, BuildService};

/// Fixed delay between polling passes in production.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Sleep dependency, pluggable so tests can drive the loop without delays.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Notification seam for status-text transitions. Fired exactly once per
/// distinct transition per build, never on repeated identical polls.
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn on_status_change(&self, build: &Build);
}

/// Overall result of a supervision run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    AllSucceeded,
    /// At least one build reached a non-success terminal status.
    SomeFailed,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        matches!(self, Verdict::AllSucceeded)
    }
}

/// Drives the per-build `running -> terminal` state machine to completion.
pub struct Supervisor {
    api: Arc<dyn BuildService>,
    listener: Arc<dyn StatusListener>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(api: Arc<dyn BuildService>, listener: Arc<dyn StatusListener>) -> Self {
        Supervisor {
            api,
            listener,
            clock: Arc::new(TokioClock),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Replace the sleep dependency (tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Poll every build until all reach a terminal status.
    ///
    /// A build that reports any terminal status leaves the active set and is
    /// never re-queried. A `get_build` failure ends supervision with an
    /// error; a non-success terminal build only affects the verdict.
    pub async fn wait_for_builds(&self, build_slugs: &[String]) -> Result<Verdict> {
        let mut active: Vec<String> = build_slugs.to_vec();
        let mut last_status: HashMap<String, String> = HashMap::new();
        let mut failed = false;

        loop {
            let mut running = 0usize;
            let mut still_active = Vec::with_capacity(active.len());

            for slug in &active {
                let build = self
                    .api
                    .get_build(slug)
                    .await
                    .context("failed to get build info")?;

                let previous = last_status.get(slug).map(String::as_str).unwrap_or_default();
                if previous != build.status_text {
                    self.listener.on_status_change(&build).await;
                    last_status.insert(slug.clone(), build.status_text.clone());
                }

                if !build.status.is_terminal() {
                    running += 1;
                    still_active.push(slug.clone());
                    continue;
                }
                if !build.status.is_success() {
                    failed = true;
                }
            }

            active = still_active;
            if running == 0 {
                break;
            }
            self.clock.sleep(self.poll_interval).await;
        }

        if failed {
            Ok(Verdict::SomeFailed)
        } else {
            Ok(Verdict::AllSucceeded)
        }
    }
}

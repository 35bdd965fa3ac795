use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::context::BridgeContext;
use crate::models::ActiveTarget;
use crate::resolver::{CandidateResolver, ProcessSource};
use crate::watch::WatchSession;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Remembers what the previous tick saw so status only changes on transitions.
#[derive(Debug, Default)]
struct Transitions {
    last_active: Option<String>,
    waiting: bool,
}

/// One poll-and-reconcile step, kept separate from the timer so it can be
/// driven directly.
pub struct Monitor {
    ctx: BridgeContext,
    processes: Box<dyn ProcessSource>,
    resolver: CandidateResolver,
    session: Arc<WatchSession>,
    transitions: Transitions,
}

impl Monitor {
    pub fn new(
        ctx: BridgeContext,
        processes: Box<dyn ProcessSource>,
        session: Arc<WatchSession>,
    ) -> Self {
        let resolver = CandidateResolver::new(ctx.config.source_root.clone());
        Self {
            ctx,
            processes,
            resolver,
            session,
            transitions: Transitions::default(),
        }
    }

    /// Reloads bindings, takes one process snapshot, resolves the active game
    /// and points the watch session at its file (or stops it).
    pub fn tick(&mut self) -> Result<Option<ActiveTarget>> {
        match self.ctx.bindings.reload_if_changed() {
            Ok(true) => log_info!("bindings reloaded from {}", self.ctx.bindings.path().display()),
            Ok(false) => {}
            Err(err) => log_warn!("keeping previous bindings: {err:#}"),
        }
        let bindings = self.ctx.bindings.bindings();

        let processes = self
            .processes
            .snapshot()
            .context("failed to list running processes")?;

        let active = self.resolver.resolve_active(&bindings, &processes);
        self.report_transition(active.as_ref());

        match &active {
            Some(ActiveTarget {
                binding,
                source_path: Some(path),
            }) => {
                self.transitions.waiting = false;
                // Failures are reported by the session; the next tick retries.
                if let Err(err) = self.session.retarget(path, binding) {
                    log::debug!("retarget to {} failed: {err}", path.display());
                }
            }
            Some(ActiveTarget {
                binding,
                source_path: None,
            }) => {
                self.session.stop();
                if !self.transitions.waiting {
                    self.transitions.waiting = true;
                    self.ctx.sink.status(format!(
                        "Active: {} (waiting for achievements.json)",
                        binding.key
                    ));
                }
            }
            None => {
                self.transitions.waiting = false;
                self.session.stop();
            }
        }

        Ok(active)
    }

    fn report_transition(&mut self, active: Option<&ActiveTarget>) {
        let key = active.map(|a| a.key().to_string());
        if key == self.transitions.last_active {
            return;
        }

        match &key {
            Some(key) => {
                log_info!("Detected active game: {key}");
                self.ctx.sink.status(format!("Active: {key}"));
            }
            None => {
                log_info!(
                    "No configured game running (previously {}).",
                    self.transitions.last_active.as_deref().unwrap_or("none")
                );
                self.ctx.sink.status("No configured game running");
            }
        }
        self.transitions.last_active = key;
        self.transitions.waiting = false;
    }
}

/// Drives [`Monitor::tick`] until cancelled.
///
/// Each tick does process-table, glob and stat calls, so it runs on the
/// blocking pool and hands the monitor back when done.
pub async fn monitor_loop(mut monitor: Monitor, poll_interval: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let joined = tokio::task::spawn_blocking(move || {
                    let result = monitor.tick();
                    (monitor, result)
                })
                .await
                .context("monitor tick worker join failed");

                match joined {
                    Ok((returned, result)) => {
                        monitor = returned;
                        if let Err(err) = result {
                            log_error!("Error in monitor loop: {err:#}");
                        }
                    }
                    Err(err) => {
                        log_error!("{err:#}");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("monitor loop shutting down");
                break;
            }
        }
    }
}

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::BridgeContext;
use crate::resolver::ProcessSource;
use crate::watch::WatchSession;

use super::loop_worker::{monitor_loop, Monitor};

/// Starts and stops the background monitor loop.
pub struct MonitorController {
    ctx: BridgeContext,
    session: Arc<WatchSession>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new(ctx: BridgeContext, session: Arc<WatchSession>) -> Self {
        Self {
            ctx,
            session,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn start(&mut self, processes: Box<dyn ProcessSource>) -> Result<()> {
        if self.handle.is_some() {
            bail!("monitoring already active");
        }

        let cancel_token = CancellationToken::new();
        let monitor = Monitor::new(self.ctx.clone(), processes, self.session.clone());
        let handle = tokio::spawn(monitor_loop(
            monitor,
            self.ctx.config.poll_interval,
            cancel_token.clone(),
        ));

        info!(
            "Monitoring started ({} bindings, polling every {:?})",
            self.ctx.bindings.bindings().len(),
            self.ctx.config.poll_interval
        );
        self.ctx.sink.status("Monitoring started");

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancels the loop, waits for it to finish and closes the watch.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let joined = if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("monitor loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        };

        self.session.stop();
        self.ctx.sink.status("Monitoring stopped");
        joined
    }
}

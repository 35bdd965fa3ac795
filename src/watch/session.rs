use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::achievements::{transform, write_destination, StableFileReader};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, ReadError};
use crate::events::EventSink;
use crate::models::Binding;

use super::debounce::DebounceGate;
use super::subscriber::{ChangeEvent, Subscriber, Subscription};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// What happened to a single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not the watched file, or the session was idle.
    Ignored,
    /// Inside the debounce window of an earlier successful run.
    Debounced,
    /// File missing, empty, corrupt or malformed; nothing was written.
    Skipped,
    Written(PathBuf),
    Failed,
}

struct ActiveWatch {
    file: PathBuf,
    binding: Binding,
    // Dropping it unsubscribes.
    subscription: Box<dyn Subscription>,
}

enum WatchState {
    Idle,
    Watching(ActiveWatch),
}

struct SessionInner {
    state: Mutex<WatchState>,
    subscriber: Arc<dyn Subscriber>,
    events_tx: UnboundedSender<ChangeEvent>,
    gate: DebounceGate,
    reader: StableFileReader,
    /// File whose subscription last failed, so a retry every tick reports once.
    failed: Mutex<Option<PathBuf>>,
    destination_base: PathBuf,
    sink: EventSink,
}

/// The single filesystem watch of the bridge.
///
/// At most one directory subscription is open at any time, bound to exactly
/// one binding. Notifications are queued on a channel and handled in order by
/// a pump task, so the OS notification thread never does any processing.
pub struct WatchSession {
    inner: Arc<SessionInner>,
    cancel_token: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl WatchSession {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &BridgeConfig, subscriber: Arc<dyn Subscriber>, sink: EventSink) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            state: Mutex::new(WatchState::Idle),
            subscriber,
            events_tx,
            gate: DebounceGate::new(config.debounce_window),
            reader: StableFileReader::new(config.settle_delay),
            failed: Mutex::new(None),
            destination_base: config.destination_root.clone(),
            sink,
        });

        let cancel_token = CancellationToken::new();
        let pump = tokio::spawn(pump(inner.clone(), events_rx, cancel_token.clone()));

        Self {
            inner,
            cancel_token,
            pump: Some(pump),
        }
    }

    /// Points the session at `source_path` for `binding`.
    ///
    /// Returns `Ok(true)` when a new subscription was opened and `Ok(false)`
    /// when the file was already being watched. In the latter case a changed
    /// binding (say, an edited destination id) is swapped in without touching
    /// the subscription.
    pub fn retarget(&self, source_path: &Path, binding: &Binding) -> Result<bool, BridgeError> {
        let file = canonical_file(source_path);
        let mut state = self.inner.lock_state();

        if let WatchState::Watching(active) = &mut *state {
            if active.file == file {
                if active.binding != *binding {
                    log_info!(
                        "binding for {} updated: {} -> {}",
                        file.display(),
                        active.binding.destination_id,
                        binding.destination_id
                    );
                    active.binding = binding.clone();
                }
                return Ok(false);
            }
        }

        if let WatchState::Watching(previous) = std::mem::replace(&mut *state, WatchState::Idle) {
            log_info!("leaving {}", previous.file.display());
        }

        let directory = match file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => {
                let err = BridgeError::Subscription {
                    directory: file.clone(),
                    reason: "source path has no parent directory".into(),
                };
                self.inner.sink.error(err.to_string());
                return Err(err);
            }
        };

        match self
            .inner
            .subscriber
            .subscribe(&directory, self.inner.events_tx.clone())
        {
            Ok(subscription) => {
                *self.inner.lock_failed() = None;
                log_info!(
                    "Started watching {} for GOG {} -> Steam {}",
                    file.display(),
                    binding.source_id,
                    binding.destination_id
                );
                self.inner.sink.status(format!("Watching {}", file.display()));
                *state = WatchState::Watching(ActiveWatch {
                    file,
                    binding: binding.clone(),
                    subscription,
                });
                Ok(true)
            }
            Err(err) => {
                let mut failed = self.inner.lock_failed();
                if failed.as_deref() != Some(file.as_path()) {
                    log_error!("Failed to start watcher: {err}");
                    self.inner.sink.error(err.to_string());
                    *failed = Some(file);
                } else {
                    log::debug!("watcher still failing: {err}");
                }
                Err(err)
            }
        }
    }

    /// Closes the subscription if there is one. Safe to call repeatedly.
    pub fn stop(&self) {
        *self.inner.lock_failed() = None;
        let previous = std::mem::replace(&mut *self.inner.lock_state(), WatchState::Idle);
        if let WatchState::Watching(active) = previous {
            drop(active);
            log_info!("Stopped file watcher.");
            self.inner.sink.status("Watcher stopped");
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(*self.inner.lock_state(), WatchState::Watching(_))
    }

    pub fn watched_file(&self) -> Option<PathBuf> {
        match &*self.inner.lock_state() {
            WatchState::Watching(active) => Some(active.file.clone()),
            WatchState::Idle => None,
        }
    }

    pub fn watched_directory(&self) -> Option<PathBuf> {
        match &*self.inner.lock_state() {
            WatchState::Watching(active) => Some(active.subscription.directory().to_path_buf()),
            WatchState::Idle => None,
        }
    }

    pub fn bound_binding(&self) -> Option<Binding> {
        match &*self.inner.lock_state() {
            WatchState::Watching(active) => Some(active.binding.clone()),
            WatchState::Idle => None,
        }
    }

    /// Queue a change event as if the OS had reported it.
    pub fn event_sender(&self) -> UnboundedSender<ChangeEvent> {
        self.inner.events_tx.clone()
    }

    /// Handle one event immediately, bypassing the queue.
    pub async fn process_event(&self, event: ChangeEvent) -> ProcessOutcome {
        self.inner.handle(event).await
    }

    /// Stops watching and waits for the pump to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        self.cancel_token.cancel();
        if let Some(handle) = self.pump.take() {
            if let Err(err) = handle.await {
                log_warn!("watch pump failed to join: {err}");
            }
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failed(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binding bound to `path` right now, if `path` is the watched file.
    fn binding_for(&self, path: &Path) -> Option<Binding> {
        match &*self.lock_state() {
            WatchState::Watching(active) if active.file == path => Some(active.binding.clone()),
            _ => None,
        }
    }

    async fn handle(&self, mut event: ChangeEvent) -> ProcessOutcome {
        event.path = canonical_file(&event.path);
        // Captured once, up front: a retarget during the settle delay must not
        // redirect this write to another profile.
        let Some(binding) = self.binding_for(&event.path) else {
            return ProcessOutcome::Ignored;
        };

        if self.gate.is_suppressed(&event.path) {
            return ProcessOutcome::Debounced;
        }

        let doc = match self.reader.read_stable(&event.path).await {
            Ok(doc) => doc,
            Err(err) if err.is_transient() => {
                log_info!("Source achievements.json is empty or missing: {err}");
                return ProcessOutcome::Skipped;
            }
            Err(err @ ReadError::Corrupt { .. }) => {
                log_warn!("{err}");
                return ProcessOutcome::Skipped;
            }
            Err(err) => {
                log_error!("{err}");
                self.sink.error(err.to_string());
                return ProcessOutcome::Failed;
            }
        };

        let transformed = match transform(&doc) {
            Ok(transformed) => transformed,
            Err(err) => {
                log_warn!("{}: {err}", event.path.display());
                self.sink.error(format!("{}: {err}", event.path.display()));
                return ProcessOutcome::Skipped;
            }
        };

        match write_destination(&self.destination_base, &binding.destination_id, &transformed).await
        {
            Ok(dest) => {
                self.gate.mark_processed(&event.path);
                log_info!("Processed {} -> {}", event.path.display(), dest.display());
                let source_name = event
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.sink
                    .log(format!("Processed {source_name} -> {}", dest.display()));
                ProcessOutcome::Written(dest)
            }
            Err(err) => {
                log_error!("Error processing achievements file: {err}");
                self.sink.error(err.to_string());
                ProcessOutcome::Failed
            }
        }
    }
}

/// Absolute path with symlinks in the directory part resolved, so it compares
/// equal to what the OS reports (macOS hands out `/private/var/...` for
/// `/var/...`). The file itself may not exist yet.
fn canonical_file(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => std::fs::canonicalize(dir)
            .map(|dir| dir.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

async fn pump(
    inner: Arc<SessionInner>,
    mut events_rx: UnboundedReceiver<ChangeEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("watch pump shutting down");
                break;
            }
            event = events_rx.recv() => match event {
                Some(event) => {
                    inner.handle(event).await;
                }
                None => break,
            }
        }
    }
}

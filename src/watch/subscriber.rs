use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::BridgeError;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// A filesystem change pushed from the notification thread to the session pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }
}

/// An open directory watch. Dropping it unsubscribes.
pub trait Subscription: Send {
    fn directory(&self) -> &Path;
}

/// Opens directory watches that report changes onto a channel.
pub trait Subscriber: Send + Sync {
    fn subscribe(
        &self,
        directory: &Path,
        events: UnboundedSender<ChangeEvent>,
    ) -> Result<Box<dyn Subscription>, BridgeError>;
}

/// Non-recursive OS notifications through `notify`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySubscriber;

struct NotifySubscription {
    directory: PathBuf,
    watcher: RecommendedWatcher,
}

impl Subscription for NotifySubscription {
    fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Drop for NotifySubscription {
    fn drop(&mut self) {
        if let Err(err) = self.watcher.unwatch(&self.directory) {
            log_warn!("unwatch {} failed: {err}", self.directory.display());
        }
    }
}

impl Subscriber for NotifySubscriber {
    fn subscribe(
        &self,
        directory: &Path,
        events: UnboundedSender<ChangeEvent>,
    ) -> Result<Box<dyn Subscription>, BridgeError> {
        let subscription_err = |err: notify::Error| BridgeError::Subscription {
            directory: directory.to_path_buf(),
            reason: err.to_string(),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in classify(event) {
                        let _ = events.send(change);
                    }
                }
                Err(err) => log_warn!("file watcher error: {err}"),
            },
            Config::default(),
        )
        .map_err(subscription_err)?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(subscription_err)?;

        log_info!("subscribed to {}", directory.display());
        Ok(Box::new(NotifySubscription {
            directory: directory.to_path_buf(),
            watcher,
        }))
    }
}

/// Keeps creations and modifications (renames onto a path count as
/// modifications); everything else is noise for our purposes.
fn classify(event: Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };
    event
        .paths
        .into_iter()
        .map(|path| ChangeEvent { path, kind })
        .collect()
}

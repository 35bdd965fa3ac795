use serde::Serialize;
use tokio::sync::mpsc;

/// Discrete notifications published for whatever front end is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "camelCase")]
pub enum BridgeEvent {
    Status(String),
    Log(String),
    Error(String),
}

/// Cloneable producer side of the event queue.
///
/// Sends never block and never fail loudly: the consumer is display-only, so a
/// closed receiver just means nobody is listening anymore.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn status(&self, text: impl Into<String>) {
        let _ = self.tx.send(BridgeEvent::Status(text.into()));
    }

    pub fn log(&self, text: impl Into<String>) {
        let _ = self.tx.send(BridgeEvent::Log(text.into()));
    }

    pub fn error(&self, text: impl Into<String>) {
        let _ = self.tx.send(BridgeEvent::Error(text.into()));
    }
}

/// Drains the queue into the log until every sink is dropped.
pub async fn forward_to_log(mut rx: mpsc::UnboundedReceiver<BridgeEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            BridgeEvent::Status(text) => log::info!("[status] {text}"),
            BridgeEvent::Log(text) => log::info!("{text}"),
            BridgeEvent::Error(text) => log::error!("{text}"),
        }
    }
}

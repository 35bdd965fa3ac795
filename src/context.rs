use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::events::EventSink;
use crate::settings::BindingStore;

/// Everything the monitor and watch session share, owned by whoever starts
/// the bridge and handed down at construction.
#[derive(Clone)]
pub struct BridgeContext {
    pub config: BridgeConfig,
    pub bindings: Arc<BindingStore>,
    pub sink: EventSink,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig, bindings: Arc<BindingStore>, sink: EventSink) -> Self {
        Self {
            config,
            bindings,
            sink,
        }
    }
}

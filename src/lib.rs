pub mod achievements;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod game_info;
pub mod models;
pub mod monitor;
pub mod resolver;
pub mod settings;
pub mod utils;
pub mod watch;

use clap::Parser;

pub use config::BridgeConfig;
pub use context::BridgeContext;
pub use error::{BridgeError, ReadError};
pub use events::{BridgeEvent, EventSink};
pub use models::{ActiveTarget, Binding};
pub use monitor::{Monitor, MonitorController};
pub use settings::BindingStore;
pub use watch::WatchSession;

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    utils::logging::init();

    log::info!("achievement-bridge starting up...");

    commands::execute(commands::Cli::parse())
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::{default_config_path, BridgeConfig};
use crate::context::BridgeContext;
use crate::events::{forward_to_log, EventSink};
use crate::game_info::{find_galaxy_dlls, find_game_info};
use crate::models::Binding;
use crate::monitor::MonitorController;
use crate::resolver::SysinfoProcessSource;
use crate::settings::BindingStore;
use crate::watch::{NotifySubscriber, WatchSession};

#[derive(Debug, Parser)]
#[command(name = "achievement-bridge", version, about = "Mirror GalaxyEmu achievements into Goldberg saves")]
pub struct Cli {
    /// Binding file (defaults to the roaming app-data folder)
    #[arg(long, global = true, env = "ACHBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch for configured games and mirror their achievements until Ctrl-C
    Run,
    /// Register a game launcher
    Add {
        /// Launcher shortcut or the game's install folder
        launcher: PathBuf,
        /// Goldberg (Steam) profile id to file achievements under
        #[arg(long)]
        steam_id: String,
        /// GOG game id; read from the folder's .info file when omitted
        #[arg(long)]
        gog_id: Option<String>,
        /// Name for the entry; defaults to the game name or GOG id
        #[arg(long)]
        key: Option<String>,
        /// Folder the game runs from, if different from the launcher's folder
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },
    /// Show configured games
    List,
    /// Forget a game
    Remove { key: String },
    /// Change the Steam profile id of a game
    SetSteamId { key: String, steam_id: String },
}

pub fn execute(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path().context("no application data directory; pass --config")?,
    };
    let store = BindingStore::new(config_path)?;

    match cli.command {
        Command::Run => {
            let config = BridgeConfig::from_env()?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime.block_on(run_bridge(config, Arc::new(store)))
        }
        Command::Add {
            launcher,
            steam_id,
            gog_id,
            key,
            working_dir,
        } => add_game(&store, launcher, steam_id, gog_id, key, working_dir),
        Command::List => {
            list_games(&store);
            Ok(())
        }
        Command::Remove { key } => {
            if !store.remove(&key)? {
                bail!("no game named '{key}'");
            }
            info!("Removed game {key}");
            Ok(())
        }
        Command::SetSteamId { key, steam_id } => {
            store.set_destination(&key, steam_id.trim())?;
            info!("Game {key} now maps to Steam {}", steam_id.trim());
            Ok(())
        }
    }
}

/// Runs the monitor until Ctrl-C, then tears everything down in order.
pub async fn run_bridge(config: BridgeConfig, store: Arc<BindingStore>) -> Result<()> {
    let (sink, events) = EventSink::channel();
    let forwarder = tokio::spawn(forward_to_log(events));

    info!(
        "Mirroring {} -> {}",
        config.source_root.display(),
        config.destination_root.display()
    );

    let ctx = BridgeContext::new(config, store, sink);
    let session = Arc::new(WatchSession::new(
        &ctx.config,
        Arc::new(NotifySubscriber),
        ctx.sink.clone(),
    ));
    let mut controller = MonitorController::new(ctx.clone(), session.clone());
    controller.start(Box::new(SysinfoProcessSource::new()))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutting down");

    let stopped = controller.stop().await;
    drop(controller);
    if let Ok(session) = Arc::try_unwrap(session) {
        session.shutdown().await;
    }
    drop(ctx);

    // The forwarder ends once every sink is gone; don't hang if one lingers.
    let _ = tokio::time::timeout(Duration::from_secs(1), forwarder).await;
    stopped
}

fn add_game(
    store: &BindingStore,
    launcher: PathBuf,
    steam_id: String,
    gog_id: Option<String>,
    key: Option<String>,
    working_dir: Option<PathBuf>,
) -> Result<()> {
    let launcher = std::path::absolute(&launcher)
        .with_context(|| format!("invalid launcher path {}", launcher.display()))?;
    if !launcher.exists() {
        bail!("launcher {} does not exist", launcher.display());
    }
    let steam_id = steam_id.trim().to_string();
    if steam_id.is_empty() {
        bail!("No Steam ID provided. Add aborted.");
    }

    let info = find_game_info(&launcher);
    let source_id = match (gog_id, &info) {
        (Some(id), _) => id.trim().to_string(),
        (None, Some(info)) => info.game_id.clone(),
        (None, None) => bail!(
            "No suitable .info file with a primary game task found next to {}; pass --gog-id",
            launcher.display()
        ),
    };
    if source_id.is_empty() {
        bail!("GOG id must not be empty");
    }

    let name = info.as_ref().and_then(|i| i.name.clone());
    let key = key
        .or_else(|| name.clone())
        .unwrap_or_else(|| source_id.clone());

    let mut binding = Binding {
        key: key.clone(),
        name,
        source_id: source_id.clone(),
        destination_id: steam_id.clone(),
        launcher_path: launcher.clone(),
        working_dir,
        info_file: None,
        executable: None,
        galaxy_dlls: Vec::new(),
        added_at: Some(Utc::now()),
    };
    if let Some(info) = info {
        binding.info_file = Some(info.info_file);
        binding.executable = info.play_task_path;
    }

    let install_dir = binding.launch_dir().unwrap_or_else(|| launcher.clone());
    binding.galaxy_dlls = find_galaxy_dlls(&install_dir);
    if !binding.galaxy_dlls.is_empty() {
        let count = binding.galaxy_dlls.len();
        warn!(
            "{count} Galaxy librar{} found under {}; achievements are only reported by a patched library",
            if count == 1 { "y" } else { "ies" },
            install_dir.display()
        );
    }

    store.add(binding)?;
    info!("Added game {key}: GOG {source_id} -> Steam {steam_id}");
    Ok(())
}

fn list_games(store: &BindingStore) {
    let bindings = store.bindings();
    if bindings.is_empty() {
        println!("No games configured ({}).", store.path().display());
        return;
    }
    for binding in bindings {
        println!(
            "{}\tGOG {}\tSteam {}\t{}",
            binding.key,
            binding.source_id,
            binding.destination_id,
            binding.launcher_path.display()
        );
        if let Some(exe) = &binding.executable {
            println!("\texecutable: {exe}");
        }
        for dll in &binding.galaxy_dlls {
            println!("\tgalaxy library: {}", dll.display());
        }
    }
}

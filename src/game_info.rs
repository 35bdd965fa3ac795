//! GOG install metadata discovery.
//!
//! GOG installers drop a `goggame-<id>.info` JSON file next to the game's
//! launcher. Its primary game play task tells us the GOG id GalaxyEmu files
//! achievements under.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const GALAXY_DLL_NAMES: [&str; 2] = ["galaxy.dll", "galaxy64.dll"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub game_id: String,
    pub name: Option<String>,
    /// Executable path of the primary play task, relative to the install folder.
    pub play_task_path: Option<String>,
    pub info_file: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoFile {
    root_game_id: Option<IdValue>,
    game_id: Option<IdValue>,
    name: Option<String>,
    title: Option<String>,
    #[serde(default)]
    play_tasks: Vec<PlayTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayTask {
    category: Option<String>,
    #[serde(default)]
    is_primary: bool,
    path: Option<String>,
}

/// GOG ids show up both as strings and as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(u64),
}

impl IdValue {
    fn into_string(self) -> Option<String> {
        match self {
            IdValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            IdValue::Text(_) => None,
            IdValue::Number(n) => Some(n.to_string()),
        }
    }
}

/// Scans the launcher's folder for `*.info` files and returns the first one
/// describing a primary game task. Unreadable or unparseable files are skipped.
pub fn find_game_info(launcher: &Path) -> Option<GameInfo> {
    let folder = if launcher.is_dir() {
        launcher
    } else {
        launcher.parent()?
    };

    let mut candidates: Vec<PathBuf> = fs::read_dir(folder)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("info"))
        })
        .collect();
    candidates.sort();

    candidates.into_iter().find_map(|path| match parse_info(&path) {
        Ok(found) => found,
        Err(err) => {
            log_warn!("Failed to parse .info {}: {err}", path.display());
            None
        }
    })
}

fn parse_info(path: &Path) -> anyhow::Result<Option<GameInfo>> {
    let contents = fs::read_to_string(path)?;
    let info: InfoFile = serde_json::from_str(&contents)?;

    let Some(task) = info
        .play_tasks
        .into_iter()
        .find(|task| task.category.as_deref() == Some("game") && task.is_primary)
    else {
        return Ok(None);
    };

    let Some(game_id) = info
        .root_game_id
        .and_then(IdValue::into_string)
        .or_else(|| info.game_id.and_then(IdValue::into_string))
    else {
        return Ok(None);
    };

    Ok(Some(GameInfo {
        game_id,
        name: info.name.or(info.title),
        play_task_path: task.path,
        info_file: path.to_path_buf(),
    }))
}

/// All `Galaxy.dll` / `Galaxy64.dll` files below `folder`, any case.
pub fn find_galaxy_dlls(folder: &Path) -> Vec<PathBuf> {
    let dlls: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| GALAXY_DLL_NAMES.contains(&name.to_lowercase().as_str()))
        })
        .map(|entry| entry.into_path())
        .collect();

    for dll in &dlls {
        log_info!("Found Galaxy library: {}", dll.display());
    }
    dlls
}

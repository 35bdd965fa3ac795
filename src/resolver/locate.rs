use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;

use crate::achievements::ACHIEVEMENTS_FILE;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// `<root>/*/<sourceId>/achievements.json`, with the literal parts escaped.
///
/// The wildcard level is the GalaxyEmu profile id, which we don't know up front.
pub fn source_pattern(source_root: &Path, source_id: &str) -> Option<String> {
    if source_id.is_empty() || source_id.contains(['/', '\\']) || source_id == ".." {
        return None;
    }
    let root = source_root.to_str()?;
    let root = root.trim_end_matches(['/', '\\']);
    Some(format!(
        "{}/*/{}/{}",
        Pattern::escape(root),
        Pattern::escape(source_id),
        ACHIEVEMENTS_FILE
    ))
}

/// Newest `achievements.json` for `source_id` across all emulator profiles.
///
/// Most recently modified wins; equal timestamps fall back to the path so
/// the choice stays stable between ticks. Missing roots, unreadable entries
/// and zero matches all come back as `None`.
pub fn find_source_file(source_root: &Path, source_id: &str) -> Option<PathBuf> {
    let Some(pattern) = source_pattern(source_root, source_id) else {
        log_warn!(
            "cannot build source pattern for id '{source_id}' under {}",
            source_root.display()
        );
        return None;
    };

    let matches = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(err) => {
            log_warn!("invalid source pattern {pattern}: {err}");
            return None;
        }
    };

    matches
        .filter_map(Result::ok)
        .filter_map(|path| {
            let meta = std::fs::metadata(&path).ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, path))
        })
        .max()
        .map(|(_, path)| path)
}

use std::path::PathBuf;

use super::Binding;

/// The binding tied to the running game, recomputed on every monitor tick.
///
/// `source_path` is `None` while the game runs but the emulator has not
/// produced its achievements file yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTarget {
    pub binding: Binding,
    pub source_path: Option<PathBuf>,
}

impl ActiveTarget {
    pub fn key(&self) -> &str {
        &self.binding.key
    }
}

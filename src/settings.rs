use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

use crate::models::Binding;
use crate::resolver::is_within;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredBindings {
    #[serde(default)]
    bindings: Vec<Binding>,
}

struct Loaded {
    data: StoredBindings,
    modified: Option<SystemTime>,
}

/// Ordered set of bindings persisted as a JSON file.
///
/// Order matters: when launch directories overlap, the earlier binding wins.
pub struct BindingStore {
    path: PathBuf,
    loaded: RwLock<Loaded>,
}

impl BindingStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn new(path: PathBuf) -> Result<Self> {
        let loaded = if path.exists() {
            read_file(&path)?
        } else {
            Loaded {
                data: StoredBindings::default(),
                modified: None,
            }
        };

        let store = Self {
            path,
            loaded: RwLock::new(loaded),
        };
        for (first, second) in store.overlaps() {
            log::warn!(
                "bindings '{first}' and '{second}' have overlapping launch folders; '{first}' takes precedence"
            );
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.loaded.read().unwrap().data.bindings.clone()
    }

    pub fn get(&self, key: &str) -> Option<Binding> {
        self.loaded
            .read()
            .unwrap()
            .data
            .bindings
            .iter()
            .find(|b| b.key == key)
            .cloned()
    }

    /// Appends a binding. Rejects duplicate keys and launch folders that nest
    /// inside (or contain) another binding's, since only one of the two could
    /// ever be detected as running.
    pub fn add(&self, binding: Binding) -> Result<()> {
        let mut guard = self.loaded.write().unwrap();
        if guard.data.bindings.iter().any(|b| b.key == binding.key) {
            bail!("a game named '{}' is already configured", binding.key);
        }
        if let Some(dir) = binding.launch_dir() {
            if let Some(existing) = guard
                .data
                .bindings
                .iter()
                .find(|b| b.launch_dir().is_some_and(|other| dirs_overlap(&dir, &other)))
            {
                bail!(
                    "launch folder {} overlaps with '{}'",
                    dir.display(),
                    existing.key
                );
            }
        }

        guard.data.bindings.push(binding);
        self.persist(&mut guard)
    }

    /// Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut guard = self.loaded.write().unwrap();
        let before = guard.data.bindings.len();
        guard.data.bindings.retain(|b| b.key != key);
        if guard.data.bindings.len() == before {
            return Ok(false);
        }
        self.persist(&mut guard)?;
        Ok(true)
    }

    pub fn set_destination(&self, key: &str, destination_id: &str) -> Result<()> {
        let mut guard = self.loaded.write().unwrap();
        let binding = guard
            .data
            .bindings
            .iter_mut()
            .find(|b| b.key == key)
            .with_context(|| format!("no game named '{key}'"))?;
        binding.destination_id = destination_id.to_string();
        self.persist(&mut guard)
    }

    /// Re-reads the file if it changed on disk since the last load or save.
    ///
    /// Returns `Ok(true)` when new bindings were loaded. On a parse failure the
    /// previous bindings stay in effect.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified().ok(),
            Err(_) => return Ok(false),
        };
        if modified.is_some() && modified == self.loaded.read().unwrap().modified {
            return Ok(false);
        }

        let fresh = read_file(&self.path)?;
        *self.loaded.write().unwrap() = fresh;
        Ok(true)
    }

    /// Pairs of binding keys whose launch folders nest, in configuration order.
    pub fn overlaps(&self) -> Vec<(String, String)> {
        let bindings = self.bindings();
        let dirs: Vec<_> = bindings.iter().map(|b| (b.key.as_str(), b.launch_dir())).collect();

        let mut pairs = Vec::new();
        for (i, (first, first_dir)) in dirs.iter().enumerate() {
            for (second, second_dir) in &dirs[i + 1..] {
                if let (Some(a), Some(b)) = (first_dir, second_dir) {
                    if dirs_overlap(a, b) {
                        pairs.push((first.to_string(), second.to_string()));
                    }
                }
            }
        }
        pairs
    }

    fn persist(&self, loaded: &mut Loaded) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let serialized = serde_json::to_string_pretty(&loaded.data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write bindings to {}", self.path.display()))?;
        loaded.modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Loaded> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bindings from {}", path.display()))?;
    let data: StoredBindings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse bindings in {}", path.display()))?;
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
    Ok(Loaded { data, modified })
}

fn dirs_overlap(a: &Path, b: &Path) -> bool {
    is_within(a, b) || is_within(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn binding(key: &str, dir: &str) -> Binding {
        Binding::new(key, "123", "999", format!("{dir}/launch.lnk")).with_working_dir(dir)
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = BindingStore::new(dir.path().join("bindings.json")).unwrap();
        assert!(store.bindings().is_empty());
    }

    #[test]
    fn add_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.json");
        let store = BindingStore::new(path.clone()).unwrap();
        store.add(binding("Zed", "/games/Zed")).unwrap();
        store.add(binding("Alpha", "/games/Alpha")).unwrap();

        let reopened = BindingStore::new(path).unwrap();
        let keys: Vec<_> = reopened.bindings().into_iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["Zed", "Alpha"]);
    }

    #[test]
    fn duplicate_keys_and_nested_folders_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BindingStore::new(dir.path().join("bindings.json")).unwrap();
        store.add(binding("Foo", "/games/Foo")).unwrap();

        assert!(store.add(binding("Foo", "/games/Other")).is_err());
        assert!(store.add(binding("Nested", "/games/Foo/Addon")).is_err());
        assert!(store.add(binding("Parent", "/games")).is_err());
        assert!(store.add(binding("Sibling", "/games/FooBar")).is_ok());
    }

    #[test]
    fn remove_and_set_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = BindingStore::new(dir.path().join("bindings.json")).unwrap();
        store.add(binding("Foo", "/games/Foo")).unwrap();

        store.set_destination("Foo", "76561198000000000").unwrap();
        assert_eq!(store.get("Foo").unwrap().destination_id, "76561198000000000");
        assert!(store.set_destination("Missing", "1").is_err());

        assert!(store.remove("Foo").unwrap());
        assert!(!store.remove("Foo").unwrap());
        assert!(store.get("Foo").is_none());
    }

    #[test]
    fn overlaps_in_hand_edited_file_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.json");
        let data = StoredBindings {
            bindings: vec![binding("Outer", "/games"), binding("Inner", "/games/Foo")],
        };
        fs::write(&path, serde_json::to_string(&data).unwrap()).unwrap();

        let store = BindingStore::new(path).unwrap();
        assert_eq!(store.overlaps(), vec![("Outer".to_string(), "Inner".to_string())]);
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.json");
        let store = BindingStore::new(path.clone()).unwrap();
        store.add(binding("Foo", "/games/Foo")).unwrap();
        assert!(!store.reload_if_changed().unwrap());

        let other = BindingStore::new(path.clone()).unwrap();
        other.add(binding("Bar", "/games/Bar")).unwrap();
        // Make sure the timestamp moves even on coarse filesystems.
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        assert!(store.reload_if_changed().unwrap());
        assert_eq!(store.bindings().len(), 2);
    }

    #[test]
    fn corrupt_reload_keeps_previous_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.json");
        let store = BindingStore::new(path.clone()).unwrap();
        store.add(binding("Foo", "/games/Foo")).unwrap();

        fs::write(&path, "{ not json").unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        assert!(store.reload_if_changed().is_err());
        assert_eq!(store.bindings().len(), 1);
    }
}

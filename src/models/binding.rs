use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured launcher mapped from a GOG game id to a Steam profile id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Unique within the configuration set.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source_id: String,
    pub destination_id: String,
    pub launcher_path: PathBuf,
    /// Working directory captured from the launcher when the entry was added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_file: Option<PathBuf>,
    /// Primary play task executable, relative to the install folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Galaxy libraries found at add time; these need the emulator dropped in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub galaxy_dlls: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl Binding {
    pub fn new(
        key: impl Into<String>,
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        launcher_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key: key.into(),
            name: None,
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            launcher_path: launcher_path.into(),
            working_dir: None,
            info_file: None,
            executable: None,
            galaxy_dlls: Vec::new(),
            added_at: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Directory a running game's executable must live under for this binding
    /// to count as active.
    ///
    /// Prefers the captured working directory. Otherwise the launcher itself
    /// when it is a directory, or the folder containing it. A launcher that no
    /// longer exists resolves to `None`.
    pub fn launch_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = self.working_dir.as_ref().filter(|d| !d.as_os_str().is_empty()) {
            return Some(dir.clone());
        }

        let launcher = self.launcher_path.as_path();
        if launcher.is_dir() {
            return Some(launcher.to_path_buf());
        }
        if launcher.exists() {
            return launcher
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_dir_wins_even_if_missing() {
        let binding = Binding::new("Foo", "123", "999", "/nowhere/foo.lnk")
            .with_working_dir("/games/Foo");
        assert_eq!(binding.launch_dir(), Some(PathBuf::from("/games/Foo")));
    }

    #[test]
    fn launcher_file_resolves_to_parent() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = dir.path().join("Foo.lnk");
        std::fs::write(&launcher, b"").unwrap();

        let binding = Binding::new("Foo", "123", "999", &launcher);
        assert_eq!(binding.launch_dir(), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn launcher_directory_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let binding = Binding::new("Foo", "123", "999", dir.path());
        assert_eq!(binding.launch_dir(), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn missing_launcher_has_no_launch_dir() {
        let binding = Binding::new("Foo", "123", "999", "/definitely/not/here.lnk");
        assert_eq!(binding.launch_dir(), None);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let binding = Binding::new("Foo", "123", "999", "C:/Games/Foo/Foo.lnk");
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["sourceId"], "123");
        assert_eq!(json["destinationId"], "999");
        assert!(json.get("workingDir").is_none());
        assert!(json.get("galaxyDlls").is_none());
    }

    #[test]
    fn install_details_round_trip() {
        let mut binding = Binding::new("Foo", "123", "999", "C:/Games/Foo/Foo.lnk");
        binding.executable = Some("bin/foo.exe".into());
        binding.galaxy_dlls = vec![PathBuf::from("C:/Games/Foo/Galaxy64.dll")];

        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["executable"], "bin/foo.exe");
        let back: Binding = serde_json::from_value(json).unwrap();
        assert_eq!(back, binding);

        let older: Binding = serde_json::from_str(
            r#"{"key":"Foo","sourceId":"123","destinationId":"999","launcherPath":"C:/Foo.lnk"}"#,
        )
        .unwrap();
        assert!(older.galaxy_dlls.is_empty());
        assert_eq!(older.executable, None);
    }
}

use std::path::{Component, Path, PathBuf};

use crate::models::{ActiveTarget, Binding};

use super::locate::find_source_file;
use super::processes::ProcessInfo;

/// Picks the binding whose game is running and finds its source file.
#[derive(Debug, Clone)]
pub struct CandidateResolver {
    source_root: PathBuf,
}

impl CandidateResolver {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }

    /// First binding, in configuration order, with a live process whose
    /// executable sits under the binding's launch directory.
    ///
    /// Overlapping launch directories are not disambiguated: the earlier
    /// binding wins. Bindings with no source id or no resolvable launch
    /// directory are skipped. Filesystem misses are never errors.
    pub fn resolve_active(
        &self,
        bindings: &[Binding],
        processes: &[ProcessInfo],
    ) -> Option<ActiveTarget> {
        let binding = bindings.iter().find(|binding| {
            if binding.source_id.is_empty() {
                return false;
            }
            let Some(launch_dir) = binding.launch_dir() else {
                return false;
            };
            processes
                .iter()
                .filter_map(|p| p.exe.as_deref())
                .any(|exe| is_within(exe, &launch_dir))
        })?;

        Some(ActiveTarget {
            binding: binding.clone(),
            source_path: find_source_file(&self.source_root, &binding.source_id),
        })
    }
}

/// Whether `path` is `folder` or lies anywhere below it.
///
/// Both sides are made absolute and lexically normalized first. Comparison is
/// per component, so `/games/Foo` does not contain `/games/FooBar`; on Windows
/// it ignores case.
pub fn is_within(path: &Path, folder: &Path) -> bool {
    if path.as_os_str().is_empty() || folder.as_os_str().is_empty() {
        return false;
    }
    let path = normalize(path);
    let folder = normalize(folder);

    let mut path_parts = path.components();
    folder
        .components()
        .all(|part| path_parts.next().is_some_and(|other| same_component(part, other)))
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn same_component(a: Component<'_>, b: Component<'_>) -> bool {
    if cfg!(windows) {
        a.as_os_str().to_string_lossy().to_lowercase() == b.as_os_str().to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(pid: u32, exe: Option<&str>) -> ProcessInfo {
        ProcessInfo::new(pid, "game", exe.map(PathBuf::from))
    }

    fn binding(key: &str, source_id: &str, dir: &str) -> Binding {
        Binding::new(key, source_id, "999", format!("{dir}/launch.lnk")).with_working_dir(dir)
    }

    #[test]
    fn containment_is_component_wise() {
        assert!(is_within(Path::new("/games/Foo/foo.exe"), Path::new("/games/Foo")));
        assert!(is_within(Path::new("/games/Foo/bin/x64/foo.exe"), Path::new("/games/Foo/")));
        assert!(is_within(Path::new("/games/Foo"), Path::new("/games/Foo")));
        assert!(!is_within(Path::new("/games/FooBar/foo.exe"), Path::new("/games/Foo")));
        assert!(!is_within(Path::new("/games/foo.exe"), Path::new("/games/Foo")));
        assert!(is_within(Path::new("/games/Foo/../Foo/./foo.exe"), Path::new("/games/Foo")));
        assert!(!is_within(Path::new(""), Path::new("/games")));
    }

    #[test]
    fn no_matching_process_resolves_to_none() {
        let resolver = CandidateResolver::new("/nonexistent/source/root");
        let bindings = vec![binding("Foo", "123", "/games/Foo")];
        let processes = vec![
            process(1, Some("/usr/bin/bash")),
            process(2, Some("/games/FooBar/foo.exe")),
            process(3, None),
        ];

        assert_eq!(resolver.resolve_active(&bindings, &processes), None);
        assert_eq!(resolver.resolve_active(&[], &processes), None);
        assert_eq!(resolver.resolve_active(&bindings, &[]), None);
    }

    #[test]
    fn unreadable_executables_never_match() {
        let resolver = CandidateResolver::new("/nonexistent/source/root");
        let bindings = vec![binding("Foo", "123", "/games/Foo")];
        assert_eq!(resolver.resolve_active(&bindings, &[process(7, None)]), None);
    }

    #[test]
    fn first_configured_binding_wins() {
        let resolver = CandidateResolver::new("/nonexistent/source/root");
        let bindings = vec![
            binding("Outer", "1", "/games"),
            binding("Inner", "2", "/games/Foo"),
        ];
        let processes = vec![process(1, Some("/games/Foo/foo.exe"))];

        let active = resolver.resolve_active(&bindings, &processes).unwrap();
        assert_eq!(active.key(), "Outer");
    }

    #[test]
    fn bindings_without_source_id_are_skipped() {
        let resolver = CandidateResolver::new("/nonexistent/source/root");
        let bindings = vec![binding("Blank", "", "/games/Foo"), binding("Foo", "123", "/games/Foo")];
        let processes = vec![process(1, Some("/games/Foo/foo.exe"))];

        assert_eq!(resolver.resolve_active(&bindings, &processes).unwrap().key(), "Foo");
    }

    #[test]
    fn active_without_source_file_has_no_path() {
        let root = tempfile::tempdir().unwrap();
        let resolver = CandidateResolver::new(root.path());
        let bindings = vec![binding("Foo", "123", "/games/Foo")];
        let processes = vec![process(1, Some("/games/Foo/foo.exe"))];

        let active = resolver.resolve_active(&bindings, &processes).unwrap();
        assert_eq!(active.binding.destination_id, "999");
        assert_eq!(active.source_path, None);
    }

    #[test]
    fn active_binding_locates_its_source_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("emu").join("123");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("achievements.json"), "{}").unwrap();

        let resolver = CandidateResolver::new(root.path());
        let bindings = vec![binding("Foo", "123", "/games/Foo")];
        let processes = vec![process(1, Some("/games/Foo/foo.exe"))];

        let active = resolver.resolve_active(&bindings, &processes).unwrap();
        assert_eq!(active.source_path, Some(dir.join("achievements.json")));
    }
}

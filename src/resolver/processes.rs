use std::path::PathBuf;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::error::BridgeError;

/// One row of the live process table.
///
/// `exe` is `None` when the executable path could not be read, typically
/// because the process belongs to another user; such rows never match a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: impl Into<String>, exe: Option<PathBuf>) -> Self {
        Self {
            pid,
            name: name.into(),
            exe,
        }
    }
}

/// Source of process table snapshots. Taken once per monitor tick.
///
/// Per-process lookup failures are folded into the rows themselves; an `Err`
/// means the whole table could not be read and the tick is skipped.
pub trait ProcessSource: Send {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>, BridgeError>;
}

/// Live process table via `sysinfo`.
pub struct SysinfoProcessSource {
    system: System,
    /// Our own PID so we can filter ourselves out
    own_pid: u32,
    poll_count: u64,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        log::info!("[processes] process source created, own_pid={}", std::process::id());
        Self {
            system: System::new(),
            own_pid: std::process::id(),
            poll_count: 0,
        }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>, BridgeError> {
        self.poll_count += 1;

        // Names come for free; the exe path is all we match on and never changes
        // for a live pid.
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
        );
        let rows = self.system.processes().len();
        if let Some(err) = table_error(sysinfo::IS_SUPPORTED_SYSTEM, rows) {
            return Err(err);
        }

        let processes: Vec<ProcessInfo> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != self.own_pid)
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                exe: process
                    .exe()
                    .filter(|exe| !exe.as_os_str().is_empty())
                    .map(|exe| exe.to_path_buf()),
            })
            .collect();

        // Log periodically (every 60th poll = every minute at the default rate)
        if self.poll_count % 60 == 1 {
            let readable = processes.iter().filter(|p| p.exe.is_some()).count();
            log::debug!(
                "[processes] poll #{}: {} processes, {} with readable executable path",
                self.poll_count,
                processes.len(),
                readable
            );
        }

        Ok(processes)
    }
}

/// An unusable process table, as opposed to a few unreadable rows.
///
/// Our own process is always listed on a working system, so an empty table
/// means the query itself failed.
fn table_error(supported: bool, rows: usize) -> Option<BridgeError> {
    if !supported {
        return Some(BridgeError::ProcessQuery(
            "process listing is not supported on this platform".into(),
        ));
    }
    if rows == 0 {
        return Some(BridgeError::ProcessQuery("process table came back empty".into()));
    }
    None
}

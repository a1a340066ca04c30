// "Is a player already running?" - a point-in-time scan of the process
// table. Two instances starting at once can both see "no"; that race is
// accepted.

use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub trait ProcessProbe {
    fn is_running(&self) -> bool;
}

/// Scans `/proc/<pid>/stat` for a process whose command name matches.
/// Reports "not running" where there is no `/proc`.
#[derive(Debug, Clone)]
pub struct ProcScan {
    name: String,
    proc_root: PathBuf,
}

impl ProcScan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proc_root: PathBuf::from("/proc"),
        }
    }

    #[cfg(test)]
    fn with_root(name: &str, proc_root: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            proc_root,
        }
    }
}

impl ProcessProbe for ProcScan {
    fn is_running(&self) -> bool {
        let Ok(entries) = fs::read_dir(&self.proc_root) else {
            return false;
        };

        let found = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()))
            })
            .filter_map(|entry| fs::read_to_string(entry.path().join("stat")).ok())
            .any(|stat| command_name(&stat) == Some(self.name.as_str()));

        debug!("{} running: {}", self.name, found);
        found
    }
}

/// The `comm` field of a stat line: between the first '(' and the last ')'.
/// Command names may themselves contain parentheses and spaces.
fn command_name(stat: &str) -> Option<&str> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    (close > open).then(|| &stat[open + 1..close])
}

/// A probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub bool);

impl ProcessProbe for Fixed {
    fn is_running(&self) -> bool {
        self.0
    }
}

// Handing an album to the external player and cleaning up afterwards.
//
// The player owns the terminal while it runs; callers suspend the UI around
// `Playback::play`. What happens after the player exits depends on whether
// it left a resume marker behind.

pub mod probe;

pub use probe::{ProcScan, ProcessProbe};

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

use crate::config::PlayerConfig;
use crate::library::Library;
use crate::queue::QueueStore;
use crate::resume::ResumeTracker;

pub trait Player {
    /// Play `target` to completion. An error means the player could not be
    /// started or exited unsuccessfully.
    fn play(&self, target: &Path) -> Result<()>;
}

/// Runs a configured command with its arguments, then the album path.
#[derive(Debug, Clone)]
pub struct ExternalPlayer {
    command: String,
    args: Vec<String>,
}

impl ExternalPlayer {
    pub fn new(command: impl Into<String>, args: &str) -> Self {
        Self {
            command: command.into(),
            args: args.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.command.clone(), &config.args)
    }
}

impl Player for ExternalPlayer {
    fn play(&self, target: &Path) -> Result<()> {
        info!("playing: {}", target.display());
        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(target)
            .status()
            .with_context(|| format!("failed to start {}", self.command))?;

        if !status.success() {
            bail!("{} exited with {}", self.command, status);
        }
        Ok(())
    }
}

/// What became of one playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Interrupted with a resume marker; this instance should exit.
    Resume,
    /// Played through; removed from the queue if it was queued.
    Completed,
    /// The player failed; nothing was changed.
    Failed,
}

pub struct Playback {
    library: Library,
    queue: QueueStore,
    resume: ResumeTracker,
    player: Box<dyn Player + Send>,
    before: Option<String>,
}

impl Playback {
    pub fn new(
        library: Library,
        queue: QueueStore,
        resume: ResumeTracker,
        player: Box<dyn Player + Send>,
        before: Option<String>,
    ) -> Self {
        Self {
            library,
            queue,
            resume,
            player,
            before,
        }
    }

    /// Run the hook and the player, then settle the queue.
    pub fn play(&self, relpath: &str) -> Result<Outcome> {
        let target = self.library.resolve(relpath);

        if let Some(hook) = self.before.as_deref() {
            run_hook(hook);
        }

        if let Err(e) = self.player.play(&target) {
            warn!("playback failed for {}: {:#}", relpath, e);
            return Ok(Outcome::Failed);
        }

        self.finish(relpath)
    }

    /// Post-playback bookkeeping. Queue invariant violations propagate.
    pub fn finish(&self, relpath: &str) -> Result<Outcome> {
        if self.resume.will_resume(relpath) {
            info!("will resume: {}", relpath);
            return Ok(Outcome::Resume);
        }

        info!("playback done");
        if self.queue.contains(relpath)? {
            self.queue.take(relpath)?;
        }
        Ok(Outcome::Completed)
    }
}

/// Split a hook command line and expand `$VAR` arguments from the
/// environment. Unset variables expand to nothing.
pub fn hook_command(line: &str) -> Option<(String, Vec<String>)> {
    let mut words = line.split_whitespace();
    let program = words.next()?.to_string();
    let args = words
        .map(|word| match word.strip_prefix('$') {
            Some(var) => std::env::var(var).unwrap_or_default(),
            None => word.to_string(),
        })
        .collect();
    Some((program, args))
}

fn run_hook(line: &str) {
    let Some((program, args)) = hook_command(line) else {
        return;
    };
    match Command::new(&program).args(&args).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("hook {} exited with {}", program, status),
        Err(e) => warn!("could not run hook {}: {}", program, e),
    }
}

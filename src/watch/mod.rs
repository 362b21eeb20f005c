//! # Watch Module
//!
//! Regenerates everything whenever an input changes, and serves the output
//! directory for preview while doing so.
//!
//! ## Overview
//!
//! [`WatchPlan`] resolves, for every environment, each concrete input path
//! (template roots, schema directories, value files, package descriptor) and
//! the directory to preview: the longest common prefix of all output
//! directories and the unresolved output template.
//!
//! [`watch`] then runs two things side by side:
//!
//! - a [`ChangeLoop`] on its own thread, consuming filesystem notifications
//! - a [`Preview`] static file server on `127.0.0.1:<port>` (blocking)
//!
//! ## Regeneration
//!
//! Every event triggers a full regeneration across all environments. Events
//! are not debounced, so an editor writing several files produces several
//! regenerations. Creation events also start watching the created path.
//! Failures are logged and the loop keeps going.

mod preview;

pub use preview::Preview;

use crate::engine::Console;
use crate::error::Result;
use crate::generator::generate;
use crate::options::{environments, Options};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::{debug, error, info, warn};

/// What to watch and what to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPlan {
    pub preview_dir: PathBuf,
    pub inputs: BTreeSet<PathBuf>,
}

impl WatchPlan {
    pub fn new(options: &Options, envs: &[String]) -> Result<Self> {
        let mut inputs = BTreeSet::new();
        for env in environments(envs) {
            inputs.extend(options.input_paths(&env)?);
        }
        Ok(Self {
            preview_dir: options.output_root(envs)?,
            inputs,
        })
    }

    /// Register every existing input with `watcher`, recursively.
    ///
    /// Returns how many paths are watched.
    pub fn register<W: Watcher>(&self, watcher: &mut W) -> Result<usize> {
        let mut watched = 0;
        for input in &self.inputs {
            if !input.exists() {
                warn!(path = %input.display(), "input does not exist, not watched");
                continue;
            }
            watcher.watch(input, RecursiveMode::Recursive)?;
            debug!(path = %input.display(), "watching");
            watched += 1;
        }
        Ok(watched)
    }
}

/// Consumes filesystem notifications and regenerates on each.
pub struct ChangeLoop<W> {
    watcher: W,
    options: Options,
    envs: Vec<String>,
    console: Console,
}

impl<W: Watcher> ChangeLoop<W> {
    pub fn new(watcher: W, options: Options, envs: Vec<String>, console: Console) -> Self {
        Self {
            watcher,
            options,
            envs,
            console,
        }
    }

    /// React to one notification. Returns the regeneration outcome, or
    /// `None` for a notification-channel error.
    pub fn handle(&mut self, event: notify::Result<Event>) -> Option<Result<Vec<PathBuf>>> {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "watch error");
                return None;
            }
        };

        if matches!(event.kind, EventKind::Create(_)) {
            for path in event.paths.iter().filter(|path| path.exists()) {
                match self.watcher.watch(path, RecursiveMode::Recursive) {
                    Ok(()) => debug!(path = %path.display(), "watching new path"),
                    Err(err) => error!(path = %path.display(), error = %err, "cannot watch new path"),
                }
            }
        }

        info!(kind = ?event.kind, paths = ?event.paths, "change detected, generating");
        let outcome = generate(&self.options, &self.envs, &self.console);
        match &outcome {
            Ok(files) => info!(files = files.len(), "generation done"),
            Err(err) => error!(error = %err, "generation failed"),
        }
        Some(outcome)
    }

    /// Handle notifications until the channel closes.
    pub fn run(mut self, events: Receiver<notify::Result<Event>>) {
        for event in events {
            // outcome is already logged
            let _ = self.handle(event);
        }
        debug!("watch channel closed");
    }
}

/// Watch the inputs of `options` and serve the output on `127.0.0.1:port`
/// until the process is terminated.
///
/// # Errors
///
/// Failures setting up the watcher or binding the preview server.
pub fn watch(options: Options, envs: Vec<String>, port: u16, console: Console) -> Result<()> {
    let plan = WatchPlan::new(&options, &envs)?;
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    let watched = plan.register(&mut watcher)?;
    info!(paths = watched, "watching for changes");

    let changes = ChangeLoop::new(watcher, options, envs, console);
    thread::Builder::new()
        .name("configen-watch".into())
        .spawn(move || changes.run(rx))?;

    let preview = Preview::bind(&plan.preview_dir, port)?;
    info!(url = %format!("http://{}", preview.addr()), dir = %plan.preview_dir.display(), "preview listening");
    preview.run();
    Ok(())
}

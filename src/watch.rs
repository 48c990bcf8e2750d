//! File system watcher for partial rebuilds.
//!
//! Monitors the template source tree and rebuilds partials while `serve
//! --watch` is running.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│    handle_changes()    │  │
//! │  │ events   │    │ (300ms)  │    │                        │  │
//! │  └──────────┘    └──────────┘    │  ┌──────────────────┐  │  │
//! │                                  │  │ Full Rebuild     │  │  │
//! │                                  │  │ (added/removed)  │  │  │
//! │                                  │  └──────────────────┘  │  │
//! │                                  │  ┌──────────────────┐  │  │
//! │                                  │  │ Incremental      │  │  │
//! │                                  │  │ (modified)       │  │  │
//! │                                  │  └──────────────────┘  │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Added or removed templates change the set of partials, so they trigger a
//! full rebuild that also regenerates the loader script. Incremental rebuilds
//! check ids against the owners recorded by the last full build, so a file
//! that lost an id collision cannot overwrite the winner's partial.

use crate::{
    build::{FileOutcome, Owners, PartialBuilder, build_site},
    compiler::CommandCompiler,
    config::{BuildConfig, SiteConfig},
    log,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher, event::ModifyKind};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// A template the builder would discover: right extension, below the
/// source root, outside the output and skipped directories.
fn is_template(path: &Path, build: &BuildConfig) -> bool {
    let extension = build.extension.trim_start_matches('.');
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));

    let Ok(relative) = path.strip_prefix(&build.source) else {
        return false;
    };
    let in_skipped_dir = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| c.as_os_str().to_str())
        .any(|name| build.skip_dirs.iter().any(|d| d == name));

    has_extension && !path.starts_with(&build.output) && !in_skipped_dir
}

/// Format path as relative for log display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    /// A template was added, removed or renamed in this batch.
    structural: bool,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            structural: false,
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event, build: &BuildConfig) {
        let structural = is_structural(&event);
        for path in event.paths {
            if !is_temp_file(&path) && is_template(&path, build) {
                self.structural |= structural;
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Drain the batch: changed paths and whether a full rebuild is needed.
    fn take(&mut self) -> (Vec<PathBuf>, bool) {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        (paths, std::mem::take(&mut self.structural))
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Attempt a full rebuild, logging errors on failure.
/// Returns true if it ran (for cooldown tracking).
fn try_full_rebuild(config: &SiteConfig, reason: &str, owners: &mut Owners) -> bool {
    log!("watch"; "{reason}");

    match build_site(config) {
        Ok(report) => {
            *owners = report.owners();
            true
        }
        Err(e) => {
            log!("watch"; "full build failed");
            log!("watch"; "{e:#}");
            false
        }
    }
}

/// Process a batch of template changes. Returns true if a rebuild ran.
fn handle_changes(
    paths: &[PathBuf],
    structural: bool,
    config: &SiteConfig,
    owners: &mut Owners,
) -> bool {
    if paths.is_empty() {
        return false;
    }

    let root = config.get_root();
    let names = paths.iter().map(|p| rel_path(p, root)).collect::<Vec<_>>().join(", ");

    if structural {
        let reason = format!("{names} added or removed, rebuilding...");
        return try_full_rebuild(config, &reason, owners);
    }

    log!("watch"; "{names} changed");

    let compiler = CommandCompiler::new(config);
    let builder = PartialBuilder::new(&config.build, &compiler);
    let mut rebuilt = 0;

    for path in paths {
        match builder.build_file(path, owners) {
            Ok(FileOutcome::Built(partial)) => {
                owners.retain(|_, source| source != path);
                owners.insert(partial.id, path.clone());
                rebuilt += 1;
            }
            Ok(FileOutcome::Skipped) => {}
            Err(e) => log!("error"; "{}: {:#}", rel_path(path, root), e),
        }
    }

    if rebuilt > 1 {
        log!("watch"; "rebuilt {} partials", rebuilt);
    }
    eprintln!(); // Blank line to separate rebuild sessions

    rebuilt > 0
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn setup_watcher(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let source = &config.build.source;
    watcher
        .watch(source, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", source.display()))?;

    log!(
        "watch";
        "{}/ (*.{})",
        rel_path(source, config.get_root()),
        config.build.extension.trim_start_matches('.')
    );
    eprintln!(); // Blank line to separate init logs from change events
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

const fn is_structural(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Start blocking file watcher with debouncing and partial rebuilds.
///
/// `owners` comes from the build that ran before serving.
pub fn watch_for_changes_blocking(config: &'static SiteConfig, mut owners: Owners) -> Result<()> {
    if !config.serve.watch {
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watcher(&mut watcher, config)?;

    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event, &config.build);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                let (paths, structural) = debouncer.take();
                if handle_changes(&paths, structural, config, &mut owners) {
                    debouncer.mark_rebuild();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

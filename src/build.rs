//! Partial building.
//!
//! Discovers template files, compiles each through the template compiler and
//! writes the HTML to `<output>/<id>.html`.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── PartialBuilder::build_all()
//!     │       │
//!     │       ├── discover() ──► sorted walk, skip dirs + output dir
//!     │       │
//!     │       └── per file, in discovery order:
//!     │               compile_file() ──► id ──► collision check ──► write_partial()
//!     │               (failures are recorded, the run continues)
//!     │
//!     └── scan_ids(output) ──► write_script() ──► <serve.root>/main.js
//! ```

use crate::{
    compiler::{CommandCompiler, CompileOptions, TemplateCompiler},
    config::{BuildConfig, SiteConfig},
    loader::{Manifest, scan_ids, script::write_script},
    log,
    utils::path::{is_contained, to_posix},
};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

// ============================================================================
// Build Outcomes
// ============================================================================

/// A partial written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    pub id: String,
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Outcome of building one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Built(Partial),
    /// No usable id; nothing written.
    Skipped,
}

/// A template that failed to compile or write.
#[derive(Debug)]
pub struct BuildFailure {
    pub source: PathBuf,
    pub error: anyhow::Error,
}

/// Result of a full build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub discovered: usize,
    pub built: Vec<Partial>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<BuildFailure>,
}

impl BuildReport {
    /// No template failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Source template of every partial this run wrote.
    pub fn owners(&self) -> Owners {
        self.built
            .iter()
            .map(|partial| (partial.id.clone(), partial.source.clone()))
            .collect()
    }
}

/// Partial id to the template that produced it.
pub type Owners = FxHashMap<String, PathBuf>;

/// Compiled HTML waiting to be written.
struct Compiled {
    id: String,
    code: String,
}

// ============================================================================
// Builder
// ============================================================================

/// Compiles templates below `config.source` into `config.output`.
pub struct PartialBuilder<'a, C: TemplateCompiler> {
    config: &'a BuildConfig,
    compiler: &'a C,
}

impl<'a, C: TemplateCompiler> PartialBuilder<'a, C> {
    pub const fn new(config: &'a BuildConfig, compiler: &'a C) -> Self {
        Self { config, compiler }
    }

    /// Find all template files, in deterministic order.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let extension = self.config.extension.trim_start_matches('.');
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.config.source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_skipped_dir(entry));

        for entry in walker {
            let entry = entry.with_context(|| {
                format!("Failed to scan templates in {}", self.config.source.display())
            })?;
            let is_template = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if entry.file_type().is_file() && is_template {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn is_skipped_dir(&self, entry: &walkdir::DirEntry) -> bool {
        entry.file_type().is_dir()
            && (entry.path() == self.config.output
                || entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.config.skip_dirs.iter().any(|dir| dir == name)))
    }

    /// Compile and write a single template.
    ///
    /// An id that `owners` assigns to another template is a collision: the
    /// existing partial is left alone and an error is returned.
    pub fn build_file(&self, path: &Path, owners: &Owners) -> Result<FileOutcome> {
        let Some(compiled) = self.compile_file(path)? else {
            return Ok(FileOutcome::Skipped);
        };
        if let Some(owner) = owners.get(&compiled.id).filter(|owner| *owner != path) {
            bail!("id `{}` already produced by {}", compiled.id, self.relative(owner));
        }
        Ok(FileOutcome::Built(self.write_partial(path, compiled)?))
    }

    /// Build every discovered template, one at a time.
    ///
    /// Per-file failures are logged and recorded; only discovery and output
    /// directory errors abort the run.
    pub fn build_all(&self) -> Result<BuildReport> {
        let output = &self.config.output;
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create output directory {}", output.display()))?;

        let files = self.discover()?;
        let mut report = BuildReport {
            discovered: files.len(),
            ..BuildReport::default()
        };

        if files.is_empty() {
            log!(
                "warn";
                "no .{} files found under {}",
                self.config.extension.trim_start_matches('.'),
                self.config.source.display()
            );
            return Ok(report);
        }

        let mut owners = Owners::default();

        for path in files {
            match self.build_file(&path, &owners) {
                Ok(FileOutcome::Built(partial)) => {
                    owners.insert(partial.id.clone(), path);
                    report.built.push(partial);
                }
                Ok(FileOutcome::Skipped) => report.skipped.push(path),
                Err(error) => {
                    log!("error"; "{}: {:#}", self.relative(&path), error);
                    report.failed.push(BuildFailure {
                        source: path,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Compile one template and derive its id. `None` means skip.
    fn compile_file(&self, path: &Path) -> Result<Option<Compiled>> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = self.relative(path);

        let output = self
            .compiler
            .compile(
                &source,
                &CompileOptions {
                    filename: &filename,
                    pretty: self.config.pretty,
                },
            )
            .with_context(|| format!("Failed to compile {filename}"))?;

        for diagnostic in &output.diagnostics {
            log!("warn"; "{filename}: {diagnostic}");
        }

        let id = derive_id(output.template_id(), path, &self.config.strip_suffix);
        if id.is_empty() {
            log!("warn"; "{filename}: cannot derive a partial id, skipped");
            return Ok(None);
        }
        if !is_contained(Path::new(&id)) {
            log!("warn"; "{filename}: id `{id}` escapes the output directory, skipped");
            return Ok(None);
        }

        Ok(Some(Compiled {
            id,
            code: output.code,
        }))
    }

    fn write_partial(&self, path: &Path, compiled: Compiled) -> Result<Partial> {
        let output = self.config.output.join(format!("{}.html", compiled.id));
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&output, compiled.code)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        log!("build"; "{} -> {}.html", self.relative(path), compiled.id);

        Ok(Partial {
            id: compiled.id,
            source: path.to_path_buf(),
            output,
        })
    }

    /// Path relative to the source root, `/`-separated.
    fn relative(&self, path: &Path) -> String {
        to_posix(path.strip_prefix(&self.config.source).unwrap_or(path))
    }
}

/// Partial id: the compiler's metadata id, else the file stem without the
/// trailing marker (`Hero-collie.collie` → `Hero`). The marker matches
/// case-insensitively, like the extension.
pub fn derive_id(meta_id: Option<&str>, path: &Path, strip_suffix: &str) -> String {
    if let Some(id) = meta_id {
        return id.to_string();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    let marker_at = stem.len().checked_sub(strip_suffix.len()).filter(|&at| {
        stem.is_char_boundary(at) && stem[at..].eq_ignore_ascii_case(strip_suffix)
    });
    match marker_at {
        Some(at) => stem[..at].to_string(),
        None => stem.into_owned(),
    }
}

// ============================================================================
// Site Build
// ============================================================================

/// Build all partials with the configured compiler, then regenerate the
/// loader script.
///
/// The script lists every partial present in the output directory, the same
/// set `check` loads, so a template that fails this run keeps its last good
/// partial in the page.
pub fn build_site(config: &SiteConfig) -> Result<BuildReport> {
    let compiler = CommandCompiler::new(config);
    let report = PartialBuilder::new(&config.build, &compiler).build_all()?;

    if config.loader.enable {
        write_loader_script(config)?;
    }

    log_build_result(&report);
    Ok(report)
}

fn write_loader_script(config: &SiteConfig) -> Result<()> {
    let ids = scan_ids(&config.build.output)?;
    if ids.is_empty() {
        return Ok(());
    }

    let Some(manifest) = Manifest::from_ids(ids.iter().map(String::as_str), config) else {
        log!(
            "warn";
            "{} is not inside {}, loader script not generated",
            config.build.output.display(),
            config.serve.root.display()
        );
        return Ok(());
    };

    let path = write_script(config, &manifest)?;
    let shown = path.strip_prefix(config.get_root()).unwrap_or(&path);
    log!("build"; "loader script -> {}", to_posix(shown));
    Ok(())
}

fn log_build_result(report: &BuildReport) {
    if report.discovered == 0 {
        return;
    }
    let built = report.built.len();
    match (report.skipped.len(), report.failed.len()) {
        (0, 0) => log!("build"; "built {built} partials"),
        (skipped, 0) => log!("build"; "built {built} partials, {skipped} skipped"),
        (skipped, failed) => {
            log!("error"; "built {built} partials, {skipped} skipped, {failed} failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

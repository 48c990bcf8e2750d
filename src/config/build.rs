//! `[build]` section configuration.
//!
//! Contains template discovery and compiler settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Enums
// ============================================================================

/// What the external compiler prints on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerFormat {
    /// A JSON object `{ code, diagnostics?, meta?: { id? } }` (default).
    #[default]
    Json,
    /// Raw HTML; stderr lines are treated as diagnostics.
    Html,
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in collie.toml - template discovery and output.
///
/// # Example
/// ```toml
/// [build]
/// source = "."                     # Directory scanned for templates
/// output = "public/collie/dist"    # Where partials are written
/// pretty = true
///
/// [build.compiler]
/// command = ["collie", "compile"]
/// format = "json"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Root of the template search.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Output directory for compiled partials.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Template file extension, matched case-insensitively (without the dot).
    #[serde(default = "defaults::build::extension")]
    #[educe(Default = defaults::build::extension())]
    pub extension: String,

    /// Trailing marker removed from file stems when deriving ids.
    #[serde(default = "defaults::build::strip_suffix")]
    #[educe(Default = defaults::build::strip_suffix())]
    pub strip_suffix: String,

    /// Directory names never entered during discovery.
    #[serde(default = "defaults::build::skip_dirs")]
    #[educe(Default = defaults::build::skip_dirs())]
    pub skip_dirs: Vec<String>,

    /// Ask the compiler for indented output.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub pretty: bool,

    /// External template compiler.
    #[serde(default)]
    pub compiler: CompilerConfig,
}

/// `[build.compiler]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Command and leading arguments; `--filename` and `--pretty` are appended.
    #[serde(default = "defaults::build::compiler::command")]
    #[educe(Default = defaults::build::compiler::command())]
    pub command: Vec<String>,

    /// Output format of the compiler.
    #[serde(default)]
    pub format: CompilerFormat,
}

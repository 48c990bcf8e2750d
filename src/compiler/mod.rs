//! Template compiler seam.
//!
//! Template compilation is delegated to an external collie compiler. This
//! module defines what the build expects from it:
//!
//! ```text
//! compile(source, { filename, pretty })
//!     -> { code, diagnostics?, meta?: { id? } }
//! ```
//!
//! Optional fields deserialize to empty values, so callers never check for
//! presence: a missing `diagnostics` is an empty list, a missing or non-string
//! `meta.id` is `None`.

mod command;

pub use command::CommandCompiler;

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Compiler Interface
// ============================================================================

/// Per-file options passed to the compiler.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    /// Source path relative to the build source root, `/`-separated.
    pub filename: &'a str,
    /// Request indented output.
    pub pretty: bool,
}

/// A synchronous template compiler, treated as a pure function of its inputs.
pub trait TemplateCompiler {
    fn compile(&self, source: &str, options: &CompileOptions<'_>)
    -> Result<CompileOutput, CompileError>;
}

/// Errors raised while compiling a single template.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to run compiler: {0:#}")]
    Spawn(anyhow::Error),

    #[error("compiler exited with {status}\n{stderr}")]
    Failed { status: String, stderr: String },

    #[error("malformed compiler output")]
    Output(#[from] serde_json::Error),

    #[error("compiler output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Template(String),
}

// ============================================================================
// Compiler Output
// ============================================================================

/// Result of compiling one template.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompileOutput {
    /// Compiled HTML.
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,

    /// Warnings reported by the compiler, in order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub diagnostics: Vec<Diagnostic>,

    /// Compiler-supplied metadata.
    #[serde(default)]
    pub meta: Option<TemplateMeta>,
}

impl CompileOutput {
    /// Output with only HTML, no diagnostics or metadata.
    pub fn html(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Metadata id, if the compiler supplied a non-empty one.
    pub fn template_id(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// `meta` object of the compiler output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemplateMeta {
    /// Logical template id; anything but a string is ignored.
    #[serde(default, deserialize_with = "string_or_none")]
    pub id: Option<String>,
}

/// A compiler diagnostic.
///
/// Compilers report either bare strings or objects with a `message`; any
/// other shape is kept verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Diagnostic {
    Message(String),
    Detailed {
        message: String,
        #[serde(default)]
        severity: Option<String>,
        #[serde(default)]
        line: Option<u32>,
        #[serde(default)]
        column: Option<u32>,
    },
    Raw(serde_json::Value),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Detailed {
                message,
                severity,
                line,
                column,
            } => {
                if let Some(severity) = severity {
                    write!(f, "{severity}: ")?;
                }
                match (line, column) {
                    (Some(line), Some(column)) => write!(f, "{line}:{column}: ")?,
                    (Some(line), None) => write!(f, "{line}: ")?,
                    _ => {}
                }
                f.write_str(message)
            }
            Self::Raw(value) => write!(f, "{value}"),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

// ============================================================================
// Tests
// ============================================================================

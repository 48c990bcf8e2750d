//! External compiler process.
//!
//! Invocation: `<command...> --filename <rel> [--pretty]` with the template
//! source on stdin, run from the project root.

use super::{CompileError, CompileOptions, CompileOutput, Diagnostic, TemplateCompiler};
use crate::{
    config::{CompilerFormat, SiteConfig},
    exec,
};
use std::path::PathBuf;

/// Runs the configured compiler command once per template.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    command: Vec<String>,
    format: CompilerFormat,
    root: PathBuf,
}

impl CommandCompiler {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            command: config.build.compiler.command.clone(),
            format: config.build.compiler.format,
            root: config.get_root().to_path_buf(),
        }
    }
}

impl TemplateCompiler for CommandCompiler {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions<'_>,
    ) -> Result<CompileOutput, CompileError> {
        let output = exec!(
            input=source;
            &self.root;
            &self.command;
            "--filename", options.filename,
            if options.pretty { "--pretty" } else { "" }
        )
        .map_err(CompileError::Spawn)?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(CompileError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        match self.format {
            CompilerFormat::Json => Ok(serde_json::from_slice(&output.stdout)?),
            CompilerFormat::Html => Ok(CompileOutput {
                code: String::from_utf8(output.stdout)?,
                diagnostics: stderr
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| Diagnostic::Message(line.to_string()))
                    .collect(),
                meta: None,
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compiler(script: &str, format: CompilerFormat, root: &TempDir) -> CommandCompiler {
        CommandCompiler {
            command: vec!["sh".into(), "-c".into(), script.into(), "collie".into()],
            format,
            root: root.path().to_path_buf(),
        }
    }

    const OPTIONS: CompileOptions<'static> = CompileOptions {
        filename: "src/Hero.collie",
        pretty: true,
    };

    #[test]
    fn test_json_output() {
        let dir = TempDir::new().unwrap();
        let c = compiler(
            r#"cat >/dev/null; printf '%s' '{"code":"<h1>Hero</h1>","meta":{"id":"hero"}}'"#,
            CompilerFormat::Json,
            &dir,
        );
        let output = c.compile("h1 Hero", &OPTIONS).unwrap();
        assert_eq!(output.code, "<h1>Hero</h1>");
        assert_eq!(output.template_id(), Some("hero"));
    }

    #[test]
    fn test_passes_filename_and_pretty_flags() {
        let dir = TempDir::new().unwrap();
        let c = compiler(r#"cat >/dev/null; printf '%s|' "$@""#, CompilerFormat::Html, &dir);

        let output = c.compile("", &OPTIONS).unwrap();
        assert_eq!(output.code, "--filename|src/Hero.collie|--pretty|");

        let compact = CompileOptions {
            pretty: false,
            ..OPTIONS
        };
        let output = c.compile("", &compact).unwrap();
        assert_eq!(output.code, "--filename|src/Hero.collie|");
    }

    #[test]
    fn test_html_output_reads_stdin_and_collects_stderr() {
        let dir = TempDir::new().unwrap();
        let c = compiler(
            r#"cat; echo "first warning" >&2; echo "" >&2; echo "second warning" >&2"#,
            CompilerFormat::Html,
            &dir,
        );
        let output = c.compile("<p>raw</p>", &OPTIONS).unwrap();
        assert_eq!(output.code, "<p>raw</p>");
        assert_eq!(
            output.diagnostics,
            vec![
                Diagnostic::Message("first warning".into()),
                Diagnostic::Message("second warning".into()),
            ]
        );
        assert!(output.meta.is_none());
    }

    #[test]
    fn test_non_zero_exit_is_failure() {
        let dir = TempDir::new().unwrap();
        let c = compiler(
            "cat >/dev/null; echo 'unexpected token at 2:4' >&2; exit 1",
            CompilerFormat::Json,
            &dir,
        );
        match c.compile("div(", &OPTIONS) {
            Err(CompileError::Failed { stderr, .. }) => {
                assert_eq!(stderr, "unexpected token at 2:4");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_failure() {
        let dir = TempDir::new().unwrap();
        let c = compiler("cat >/dev/null; echo 'not json'", CompilerFormat::Json, &dir);
        assert!(matches!(
            c.compile("", &OPTIONS),
            Err(CompileError::Output(_))
        ));
    }

    #[test]
    fn test_missing_compiler_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let c = CommandCompiler {
            command: vec!["surely-not-a-collie-compiler".into()],
            format: CompilerFormat::Json,
            root: dir.path().to_path_buf(),
        };
        assert!(matches!(c.compile("", &OPTIONS), Err(CompileError::Spawn(_))));
    }
}

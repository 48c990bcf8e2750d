//! External command execution utilities.
//!
//! Runs a command with stdin piped from memory and stdout/stderr captured.
//! Used to drive the external template compiler.

use anyhow::{Context, Result, bail};
use std::{
    ffi::OsString,
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
    thread,
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command, feeding `input` to its stdin.
///
/// # Examples
/// ```ignore
/// // Without working directory
/// exec!(input=source; &["collie", "compile"]; "--filename", rel)?;
///
/// // With working directory
/// exec!(input=source; root; &command; "--pretty")?;
/// ```
#[macro_export]
macro_rules! exec {
    (input=$input:expr; $root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            Some(AsRef::<::std::path::Path>::as_ref($root)),
            $cmd,
            &$crate::utils::exec::filter_args(&[$($crate::utils::exec::to_os($arg)),*]),
            $input.as_ref(),
        )
    };
    (input=$input:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            None,
            $cmd,
            &$crate::utils::exec::filter_args(&[$($crate::utils::exec::to_os($arg)),*]),
            $input.as_ref(),
        )
    };
}

// ============================================================================
// Argument Conversion
// ============================================================================

/// Convert to `OsString`.
#[inline]
pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
    s.into()
}

/// Filter out empty args.
#[inline]
pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
    args.iter().filter(|a| !a.is_empty()).cloned().collect()
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command, write `input` to its stdin, and capture its output.
///
/// The exit status is returned as-is inside [`Output`]; callers decide what
/// a non-zero status means.
///
/// # Errors
/// Returns error if the command is empty, cannot be spawned, or its pipes fail.
pub fn exec(
    root: Option<&Path>,
    cmd: &[String],
    args: &[OsString],
    input: &[u8],
) -> Result<Output> {
    let Some((program, leading)) = cmd.split_first() else {
        bail!("empty command");
    };

    let mut command = Command::new(program);
    command
        .args(leading)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(root) = root {
        command.current_dir(root);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to execute `{program}`"))?;

    // Write stdin from a separate thread: a child that fills its stdout pipe
    // before reading all input would otherwise deadlock against us.
    let mut stdin = child.stdin.take().context("Failed to acquire stdin")?;
    let input = input.to_vec();
    let writer = thread::spawn(move || stdin.write_all(&input));

    let output = child
        .wait_with_output()
        .with_context(|| format!("`{program}` process failed"))?;

    match writer.join() {
        Ok(Ok(())) => {}
        // The child may legitimately exit without reading all of stdin.
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e).context(format!("Failed to write stdin of `{program}`")),
        Err(_) => bail!("Failed to join stdin writer thread"),
    }

    Ok(output)
}

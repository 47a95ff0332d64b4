//! Copying export previews to the system clipboard.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// Which mechanism accepted the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopiedVia {
    System,
    Command(&'static str),
}

impl fmt::Display for CopiedVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopiedVia::System => f.write_str("system clipboard"),
            CopiedVia::Command(program) => write!(f, "{program}"),
        }
    }
}

/// System clipboard with helper-program fallbacks for terminals without a display server.
pub struct PreviewClipboard {
    system: Option<arboard::Clipboard>,
}

impl PreviewClipboard {
    pub fn new() -> Self {
        let system = arboard::Clipboard::new()
            .inspect_err(|err| tracing::debug!(error = %err, "system clipboard unavailable"))
            .ok();
        Self { system }
    }

    /// Copy an export preview. Empty previews are refused.
    pub fn copy_preview(&mut self, content: &str) -> Result<CopiedVia> {
        if content.is_empty() {
            bail!("nothing to copy; the preview is empty");
        }

        if let Some(system) = self.system.as_mut() {
            match system.set_text(content.to_owned()) {
                Ok(()) => return Ok(CopiedVia::System),
                Err(err) => tracing::debug!(error = %err, "system clipboard rejected text"),
            }
            self.system = None;
        }

        for helper in HELPERS {
            match pipe_into(helper, content) {
                Ok(()) => {
                    tracing::debug!(program = helper[0], "copied preview via helper");
                    return Ok(CopiedVia::Command(helper[0]));
                }
                Err(err) => tracing::trace!(program = helper[0], error = %err, "helper failed"),
            }
        }
        bail!("no clipboard backend accepted the preview")
    }
}

impl Default for PreviewClipboard {
    fn default() -> Self {
        Self::new()
    }
}

fn pipe_into(helper: &[&str], content: &str) -> Result<()> {
    let (program, args) = helper
        .split_first()
        .context("clipboard helper has no program")?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    child
        .stdin
        .take()
        .context("helper stdin unavailable")?
        .write_all(content.as_bytes())
        .with_context(|| format!("failed to write to {program}"))?;

    let status = child
        .wait()
        .with_context(|| format!("{program} did not exit cleanly"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

#[cfg(target_os = "macos")]
const HELPERS: &[&[&str]] = &[&["pbcopy"]];

#[cfg(all(unix, not(target_os = "macos")))]
const HELPERS: &[&[&str]] = &[&["wl-copy"], &["xclip", "-selection", "clipboard"], &["xsel", "-ib"]];

#[cfg(target_os = "windows")]
const HELPERS: &[&[&str]] = &[&["clip.exe"]];

#[cfg(not(any(unix, target_os = "windows")))]
const HELPERS: &[&[&str]] = &[];

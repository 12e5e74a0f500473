//! Shared output layer: human text or stable JSON for every command.
//!
//! Each command handler receives an [`OutputMode`] and renders its payload
//! accordingly: labelled text for humans, pretty-printed JSON for machines.
//! The global `--json` flag selects the mode.

use serde::Serialize;
use std::io::{self, Write};

/// The two output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable labelled text.
    Human,
    /// Machine-readable JSON (one document per invocation).
    Json,
}

impl OutputMode {
    /// Derive the mode from the global `--json` flag.
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }

    /// Returns `true` if JSON output was requested.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<22} {}", format!("{key}:"), value.as_ref())
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode the value is serialized with `serde_json`; in human mode
/// the provided closure writes the text rendering.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Human => human_fn(value, &mut out)?,
    }
    Ok(())
}

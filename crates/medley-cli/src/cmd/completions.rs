use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};
use std::io::Write;

/// Arguments for `mdy completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write a completion script for `shell` to `out`.
///
/// # Errors
///
/// Returns an error if writing the script fails.
pub fn run_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) -> Result<()> {
    generate(shell, command, "mdy", out);
    Ok(())
}

//! Running external tools (fluidsynth, ffmpeg) to completion.

use std::process::{Command, ExitStatus, Output};

/// How much of a failing tool's stderr is kept for the error message.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Human-readable form of a command line, for logs and errors.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run `cmd`, blocking until it exits. Non-zero exit is an error.
pub fn run(cmd: &mut Command) -> Result<Output, ToolError> {
    let command = describe(cmd);
    tracing::debug!(%command, "running");

    let output = cmd.output().map_err(|source| ToolError::Spawn {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            command,
            status: output.status,
            stderr: tail(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(output)
}

fn tail(text: &str) -> String {
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

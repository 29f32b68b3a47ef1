//! Running external tools from stage command templates.
//!
//! Templates come from the configuration and may reference `{file}`,
//! `{output}`, `{build_dir}` and `{project_dir}`. Substituted values are
//! shell-quoted. The rendered line runs through the platform shell and blocks
//! until it exits.

use std::process::Command;

use crate::errors::StageError;

use super::StageContext;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub code: i32,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero exit into `StageError::CommandFailed`.
    pub fn require_success(self) -> Result<Self, StageError> {
        if self.success() {
            Ok(self)
        } else {
            Err(StageError::CommandFailed {
                command: self.command,
                code: self.code,
            })
        }
    }
}

/// Substitute `{name}` placeholders in `template`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut line = template.to_string();
    for (name, value) in vars {
        line = line.replace(&format!("{{{}}}", name), &shell_quote(value));
    }
    line
}

/// Quote `value` for `sh` unless it only contains safe characters.
pub fn shell_quote(value: &str) -> String {
    if cfg!(windows) {
        return if value.contains(' ') {
            format!("\"{}\"", value)
        } else {
            value.to_string()
        };
    }
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:=+@%".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Log and run `command_line` in the build directory, echoing its stdout and
/// stderr as raw log lines.
pub fn run_shell(
    ctx: &mut StageContext<'_>,
    command_line: &str,
) -> Result<CommandOutput, StageError> {
    ctx.command(command_line);

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C");
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c");
        c
    };

    let output = cmd
        .arg(command_line)
        .current_dir(ctx.layout().build_dir())
        .output()
        .map_err(|source| StageError::CommandSpawnFailed {
            command: command_line.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    for text in [stdout.as_str(), &*stderr] {
        if !text.trim().is_empty() {
            ctx.raw(text.trim_end());
        }
    }

    let code = output.status.code().unwrap_or(-1);
    tracing::debug!(command = command_line, code, "external command finished");

    Ok(CommandOutput {
        command: command_line.to_string(),
        code,
        stdout,
    })
}

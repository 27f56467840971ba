//! Helpers shared by the CLI-driven session drivers.

use serde_json::Value;
use similar::TextDiff;
use std::sync::Arc;

use super::{ConnectError, DeviceParams};
use crate::config::Config;
use crate::connection::{
    CommandResult, Connection, ConnectionError, ExecuteOptions, LocalConnection, SshConnection,
    TransportKind,
};

// ============================================================================
// Transport selection
// ============================================================================

/// Build the transport selected by `optional_args.transport`.
pub fn build_connection(
    params: &DeviceParams,
    config: &Config,
) -> Result<Arc<dyn Connection>, ConnectError> {
    let transport = match params.optional_str("transport") {
        Some(value) => value.parse::<TransportKind>()?,
        None => TransportKind::default(),
    };

    match transport {
        TransportKind::Local => Ok(Arc::new(LocalConnection::with_identifier(
            params.hostname.clone(),
        ))),
        TransportKind::Ssh => {
            let mut conn = SshConnection::new(&params.hostname, &params.username, &config.ssh)
                .with_connect_timeout(params.timeout);
            if let Some(port) = optional_port(params)? {
                conn = conn.with_port(port);
            }
            if let Some(ref password) = params.password {
                conn = conn.with_password(password.clone());
            }
            Ok(Arc::new(conn))
        }
    }
}

fn optional_port(params: &DeviceParams) -> Result<Option<u16>, ConnectError> {
    let value = match params.optional_args.get("port") {
        Some(value) => value,
        None => return Ok(None),
    };
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.parse::<u16>().ok(),
        _ => None,
    };
    port.map(Some).ok_or_else(|| {
        ConnectError::Transport(ConnectionError::InvalidConfig(format!(
            "invalid port: {}",
            value
        )))
    })
}

/// Classify a transport failure seen while opening a session.
pub fn connect_error(err: ConnectionError) -> ConnectError {
    match err {
        ConnectionError::AuthenticationFailed(msg) => ConnectError::AuthenticationFailed(msg),
        ConnectionError::ConnectionFailed(msg) => ConnectError::Unreachable(msg),
        other => ConnectError::Transport(other),
    }
}

/// Run a command with the device timeout and an optional stdin payload.
pub async fn run_command(
    conn: &dyn Connection,
    command: &str,
    stdin: Option<&str>,
    timeout: u64,
) -> Result<CommandResult, ConnectionError> {
    let mut options = ExecuteOptions::new().with_timeout(timeout);
    if let Some(input) = stdin {
        options = options.with_stdin(input);
    }
    conn.execute(command, Some(options)).await
}

// ============================================================================
// Output handling
// ============================================================================

/// Return the first line that looks like a device error, if any.
///
/// `markers` are matched against the start of each trimmed line.
pub fn find_error_line(output: &str, markers: &[&str]) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| markers.iter().any(|m| line.starts_with(m)))
        .map(String::from)
}

/// Error text for a failed command: device error line, stderr, or exit code.
pub fn failure_message(result: &CommandResult, markers: &[&str]) -> String {
    if let Some(line) = find_error_line(&result.combined_output(), markers) {
        return line;
    }
    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    if result.success {
        return format!("unexpected output: {}", result.stdout.trim());
    }
    format!("command exited with status {}", result.exit_code)
}

/// Clean up configuration output (remove command echo and trailing prompts).
pub fn clean_config_output(output: &str) -> String {
    let mut lines: Vec<&str> = output.lines().collect();

    if lines.first().is_some_and(|first| first.contains("show ")) {
        lines.remove(0);
    }

    while let Some(last) = lines.last() {
        let last = last.trim();
        if last.ends_with('#') || last.ends_with('>') || last.is_empty() {
            lines.pop();
        } else {
            break;
        }
    }

    lines.join("\n")
}

/// Configuration lines worth comparing: non-blank and not a `!` comment.
pub fn significant_lines(config: &str) -> Vec<&str> {
    config
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim().starts_with('!'))
        .collect()
}

// ============================================================================
// Diff generation
// ============================================================================

/// Unified diff between two configurations; empty when they match.
pub fn unified_config_diff(running: &str, candidate: &str) -> String {
    let running = normalize(running);
    let candidate = normalize(candidate);
    TextDiff::from_lines(&running, &candidate)
        .unified_diff()
        .context_radius(3)
        .header("running", "candidate")
        .to_string()
}

/// `+ line` entries for candidate lines the running configuration lacks.
///
/// Used for merge-mode diffs, where lines absent from the candidate are
/// kept by the device and must not show up as removals.
pub fn merge_config_diff(running: &str, candidate: &str) -> String {
    let present: std::collections::HashSet<&str> =
        significant_lines(running).into_iter().map(str::trim).collect();

    significant_lines(candidate)
        .into_iter()
        .filter(|line| !present.contains(line.trim()))
        .map(|line| format!("+{}\n", line))
        .collect()
}

/// Commands that turn `running` into `candidate`.
///
/// Merge mode applies the candidate as-is. Replace mode first negates every
/// top-level running statement the candidate no longer carries.
pub fn config_commands(running: &str, candidate: &str, replace: bool) -> Vec<String> {
    let mut commands = Vec::new();

    if replace {
        let wanted: std::collections::HashSet<&str> = significant_lines(candidate)
            .into_iter()
            .filter(|line| !line.starts_with(' '))
            .collect();

        for line in significant_lines(running) {
            if line.starts_with(' ') || wanted.contains(line) || line.starts_with("no ") {
                continue;
            }
            commands.push(format!("no {}", line.trim_end()));
        }
    }

    commands.extend(
        significant_lines(candidate)
            .into_iter()
            .map(|line| line.trim_end().to_string()),
    );
    commands
}

fn normalize(config: &str) -> String {
    let mut out: String = config
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

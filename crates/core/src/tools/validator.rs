//! # Command Validator
//!
//! Static validation by piping the candidate source into a configured
//! command. The command decides what "valid" means (the default parses Python
//! with `ast`); a non-zero exit is a syntax failure and its stderr becomes the
//! diagnostics handed back to the generator.

use super::{CodeValidator, ValidationReport};
use crate::config::SandboxConfig;
use crate::errors::BackendError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Diagnostic lines kept per failed command
const MAX_DIAGNOSTIC_LINES: usize = 12;

/// Validator backed by external commands reading source on stdin
#[derive(Debug, Clone)]
pub struct CommandValidator {
    syntax_command: Vec<String>,
    execute_command: Option<Vec<String>>,
}

/// Exit status plus captured stderr of one command run
struct CommandRun {
    success: bool,
    stderr: String,
}

impl CommandValidator {
    pub fn new(syntax_command: Vec<String>) -> Self {
        Self {
            syntax_command,
            execute_command: None,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            syntax_command: config.syntax_command.clone(),
            execute_command: config.execute_command.clone(),
        }
    }

    pub fn with_execution(mut self, command: Vec<String>) -> Self {
        self.execute_command = Some(command);
        self
    }

    async fn run_with_stdin(command: &[String], input: &str) -> Result<CommandRun, BackendError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| BackendError::Rejected("validator command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    BackendError::Rejected(format!("validator '{program}' not found"))
                }
                _ => BackendError::Transport(format!("failed to start '{program}': {e}")),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| BackendError::Transport(format!("failed to write source: {e}")))?;
            // Dropping stdin closes the pipe so the command sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::Transport(format!("validator did not finish: {e}")))?;

        Ok(CommandRun {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CodeValidator for CommandValidator {
    async fn validate(&self, source: &str) -> Result<ValidationReport, BackendError> {
        let syntax = Self::run_with_stdin(&self.syntax_command, source).await?;
        if !syntax.success {
            let mut diagnostics = parse_diagnostics(&syntax.stderr);
            if diagnostics.is_empty() {
                diagnostics.push("syntax check failed without output".to_string());
            }
            return Ok(ValidationReport::invalid(diagnostics));
        }

        let Some(execute) = &self.execute_command else {
            return Ok(ValidationReport::valid());
        };

        let run = Self::run_with_stdin(execute, source).await?;
        Ok(ValidationReport {
            syntax_valid: true,
            execution_ok: Some(run.success),
            diagnostics: if run.success {
                Vec::new()
            } else {
                parse_diagnostics(&run.stderr)
            },
        })
    }
}

/// Keep the tail of stderr, where interpreters put the actual error.
pub fn parse_diagnostics(stderr: &str) -> Vec<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(MAX_DIAGNOSTIC_LINES);
    lines[start..].iter().map(|line| line.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diagnostics_keeps_tail() {
        let stderr = (0..20)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let diagnostics = parse_diagnostics(&stderr);
        assert_eq!(diagnostics.len(), MAX_DIAGNOSTIC_LINES);
        assert_eq!(diagnostics.last().map(String::as_str), Some("line 19"));
    }

    #[tokio::test]
    async fn test_missing_program_is_rejected() {
        let validator = CommandValidator::new(vec!["kiln-no-such-validator".to_string()]);
        let result = validator.validate("print(1)").await;
        assert!(matches!(result, Err(BackendError::Rejected(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_validity() {
        let sh = |script: &str| vec!["sh".to_string(), "-c".to_string(), script.to_string()];

        let accepting = CommandValidator::new(sh("cat > /dev/null"));
        let report = accepting.validate("anything").await.unwrap();
        assert!(report.syntax_valid);
        assert_eq!(report.execution_ok, None);

        let rejecting = CommandValidator::new(sh(
            "cat > /dev/null; echo 'SyntaxError: invalid syntax' >&2; exit 1",
        ));
        let report = rejecting.validate("def (").await.unwrap();
        assert!(!report.syntax_valid);
        assert_eq!(report.diagnostics, vec!["SyntaxError: invalid syntax"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execution_result_reported() {
        let sh = |script: &str| vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        let validator = CommandValidator::new(sh("cat > /dev/null"))
            .with_execution(sh("cat > /dev/null; echo boom >&2; exit 3"));

        let report = validator.validate("x = 1").await.unwrap();
        assert!(report.syntax_valid);
        assert_eq!(report.execution_ok, Some(false));
        assert_eq!(report.diagnostics, vec!["boom"]);
    }
}

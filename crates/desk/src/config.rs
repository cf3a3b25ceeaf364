use std::path::PathBuf;
use std::time::Duration;

use temoa_serve::ReadinessOptions;
use temoa_worker::computation::{DEFAULT_ARGS, DEFAULT_PROGRAM};
use temoa_worker::ExternalCommand;

/// Desk configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local Temoa install.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskConfig {
    /// Optimizer executable (default: `temoa`).
    pub program: String,
    /// Whitespace-separated argument template (default:
    /// `run {config} --output {output}`).
    pub args_template: String,
    /// Root for `output_files/`; `None` means the configuration file's
    /// directory.
    pub output_root: Option<PathBuf>,
    /// Ask the optimizer to suppress console echo (default: `false`).
    pub silent: bool,
    /// Query server readiness timeout in milliseconds (default: `5000`).
    pub query_ready_timeout_ms: u64,
    /// Query server readiness poll interval in milliseconds (default: `50`).
    pub query_ready_poll_ms: u64,
    /// Rows shown when the log view is redrawn (default: `40`).
    pub log_view_rows: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args_template: DEFAULT_ARGS.to_string(),
            output_root: None,
            silent: false,
            query_ready_timeout_ms: 5000,
            query_ready_poll_ms: 50,
            log_view_rows: temoa_events::view::DEFAULT_VIEWPORT_ROWS,
        }
    }
}

impl DeskConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                          |
    /// |--------------------------|----------------------------------|
    /// | `TEMOA_PROGRAM`          | `temoa`                          |
    /// | `TEMOA_ARGS`             | `run {config} --output {output}` |
    /// | `TEMOA_OUTPUT_ROOT`      | configuration file's directory   |
    /// | `TEMOA_SILENT`           | `false`                          |
    /// | `QUERY_READY_TIMEOUT_MS` | `5000`                           |
    /// | `QUERY_READY_POLL_MS`    | `50`                             |
    /// | `LOG_VIEW_ROWS`          | `40`                             |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let program = std::env::var("TEMOA_PROGRAM").unwrap_or(defaults.program);
        let args_template = std::env::var("TEMOA_ARGS").unwrap_or(defaults.args_template);

        let output_root = std::env::var("TEMOA_OUTPUT_ROOT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let silent: bool = std::env::var("TEMOA_SILENT")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("TEMOA_SILENT must be true or false");

        let query_ready_timeout_ms: u64 = std::env::var("QUERY_READY_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("QUERY_READY_TIMEOUT_MS must be a valid u64");

        let query_ready_poll_ms: u64 = std::env::var("QUERY_READY_POLL_MS")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("QUERY_READY_POLL_MS must be a valid u64");

        let log_view_rows: usize = std::env::var("LOG_VIEW_ROWS")
            .unwrap_or_else(|_| "40".into())
            .parse()
            .expect("LOG_VIEW_ROWS must be a valid usize");

        Self {
            program,
            args_template,
            output_root,
            silent,
            query_ready_timeout_ms,
            query_ready_poll_ms,
            log_view_rows,
        }
    }

    pub fn readiness(&self) -> ReadinessOptions {
        ReadinessOptions {
            timeout: Duration::from_millis(self.query_ready_timeout_ms),
            poll_interval: Duration::from_millis(self.query_ready_poll_ms.max(1)),
        }
    }

    /// The optimizer invocation described by `program` and `args_template`.
    pub fn computation(&self) -> ExternalCommand {
        ExternalCommand::from_template(self.program.clone(), &self.args_template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = DeskConfig::default();
        assert_eq!(config.program, "temoa");
        assert_eq!(config.args_template, "run {config} --output {output}");
        assert_eq!(config.readiness().timeout, Duration::from_secs(5));
        assert_eq!(config.readiness().poll_interval, Duration::from_millis(50));
        assert_eq!(config.log_view_rows, 40);
    }

    #[test]
    fn computation_uses_the_configured_program() {
        let config = DeskConfig {
            program: "/opt/temoa/bin/temoa".into(),
            ..DeskConfig::default()
        };
        assert_eq!(config.computation().program(), "/opt/temoa/bin/temoa");
    }
}

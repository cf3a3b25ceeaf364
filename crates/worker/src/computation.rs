//! The opaque optimization call and its external-process implementation.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{bail, Context};
use temoa_events::{LineSink, RunIo};

use crate::materialize::MaterializedConfig;

/// A long, blocking computation that writes its artifacts into
/// `output_dir`.
///
/// Called on a dedicated worker thread. Diagnostics go to `tracing` (captured
/// for the duration of the call) or to the `io` streams. Returning an error or
/// panicking marks the run failed.
pub trait Computation: Send + Sync + 'static {
    fn run(
        &self,
        config: &MaterializedConfig,
        output_dir: &Path,
        io: &mut RunIo,
    ) -> anyhow::Result<()>;
}

impl<F> Computation for F
where
    F: Fn(&MaterializedConfig, &Path, &mut RunIo) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn run(
        &self,
        config: &MaterializedConfig,
        output_dir: &Path,
        io: &mut RunIo,
    ) -> anyhow::Result<()> {
        self(config, output_dir, io)
    }
}

// ---------------------------------------------------------------------------
// ExternalCommand
// ---------------------------------------------------------------------------

/// Default optimizer executable.
pub const DEFAULT_PROGRAM: &str = "temoa";

/// Default argument template. `{config}`, `{output}` and `{run_config}` are
/// substituted per run.
pub const DEFAULT_ARGS: &str = "run {config} --output {output}";

/// Flag appended when the request asks for a quiet console.
pub const SILENT_FLAG: &str = "--silent";

/// Runs the optimizer as a child process and streams its output into the
/// run's capture.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated argument template.
    pub fn from_template(program: impl Into<String>, template: &str) -> Self {
        Self::new(
            program,
            template.split_whitespace().map(str::to_owned).collect(),
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for one run, placeholders substituted.
    pub fn render_args(&self, config: &MaterializedConfig, output_dir: &Path) -> Vec<String> {
        let config_path = config.source_path.display().to_string();
        let output = output_dir.display().to_string();
        let run_config = config.record_path().display().to_string();

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                arg.replace("{config}", &config_path)
                    .replace("{output}", &output)
                    .replace("{run_config}", &run_config)
            })
            .collect();
        if config.silent && !args.iter().any(|a| a == SILENT_FLAG) {
            args.push(SILENT_FLAG.to_string());
        }
        args
    }
}

impl Default for ExternalCommand {
    fn default() -> Self {
        Self::from_template(DEFAULT_PROGRAM, DEFAULT_ARGS)
    }
}

impl Computation for ExternalCommand {
    fn run(
        &self,
        config: &MaterializedConfig,
        output_dir: &Path,
        io: &mut RunIo,
    ) -> anyhow::Result<()> {
        let args = self.render_args(config, output_dir);
        tracing::info!(program = %self.program, args = ?args, "Launching optimizer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(config.source_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {}", self.program))?;

        let stderr_reader = child.stderr.take().map(|stderr| {
            let sink = io.stderr().fork();
            thread::spawn(move || forward_lines(stderr, sink))
        });

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, io.stdout().fork());
        }

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.program))?;
        if let Some(reader) = stderr_reader {
            // The reader only ends at EOF; a panic there loses trailing lines
            // at worst.
            let _ = reader.join();
        }

        if !status.success() {
            bail!("{} exited with {status}", self.program);
        }
        tracing::info!(program = %self.program, "Optimizer finished");
        Ok(())
    }
}

/// Copy a child stream into a sink until EOF, tolerating invalid UTF-8.
fn forward_lines(stream: impl Read, mut sink: LineSink) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let _ = sink.write_all(&buf);
            }
            Err(e) => {
                sink.write_line(&format!("<stream read failed: {e}>"));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use temoa_core::RunRequest;

    use super::*;

    fn config(silent: bool) -> MaterializedConfig {
        let request = RunRequest::new("/models/utopia/config.toml").with_silent(silent);
        MaterializedConfig::new(&request, String::new(), PathBuf::from("/out/run"))
    }

    #[test]
    fn default_template_substitutes_paths() {
        let cmd = ExternalCommand::default();
        let args = cmd.render_args(&config(false), Path::new("/out/run"));
        assert_eq!(
            args,
            ["run", "/models/utopia/config.toml", "--output", "/out/run"]
        );
    }

    #[test]
    fn silent_requests_append_the_flag_once() {
        let cmd = ExternalCommand::from_template("temoa", "run {config} --silent");
        let args = cmd.render_args(&config(true), Path::new("/out/run"));
        assert_eq!(args.iter().filter(|a| *a == SILENT_FLAG).count(), 1);

        let cmd = ExternalCommand::default();
        let args = cmd.render_args(&config(true), Path::new("/out/run"));
        assert_eq!(args.last().map(String::as_str), Some(SILENT_FLAG));
    }

    #[test]
    fn run_config_placeholder_points_into_output_dir() {
        let cmd = ExternalCommand::from_template("temoa", "--record {run_config}");
        let args = cmd.render_args(&config(false), Path::new("/out/run"));
        assert_eq!(args, ["--record", "/out/run/run_config.json"]);
    }
}

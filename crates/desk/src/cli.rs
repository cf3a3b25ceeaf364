//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use temoa_core::Overrides;

/// Run Temoa models from the terminal and browse their results locally.
#[derive(Debug, Parser)]
#[command(name = "temoa-desk", version, about)]
pub struct Cli {
    /// Model configuration file (.toml, .dat or .txt).
    pub config: PathBuf,

    /// Override a configuration value, e.g. `--set solver.name=highs`.
    /// Values are parsed as JSON and fall back to plain strings.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, serde_json::Value)>,

    /// Start a run immediately and keep serving its artifacts until Ctrl-C.
    #[arg(long)]
    pub once: bool,

    /// Directory that receives `output_files/` (overrides TEMOA_OUTPUT_ROOT).
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        self.overrides.iter().cloned().collect()
    }
}

/// Parse `key=value`.
pub fn parse_override(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in {raw:?}"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

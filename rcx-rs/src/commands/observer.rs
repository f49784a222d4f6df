//! `add-observer` command: inject an observer into a recording

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

use aom_rcx::{ObserverInjector, ObserverOptions};

/// Suffix appended to the input file stem for the default output name
const OUTPUT_SUFFIX: &str = "_obs";

#[derive(Args)]
pub struct AddObserverArgs {
    /// Path to the recording
    pub file: PathBuf,

    /// Observer display name
    pub name: Option<String>,

    /// Decode with the legacy engine layout
    #[arg(long)]
    pub legacy: bool,

    /// Zero-based tick that receives the synthetic resigns (repeatable)
    #[arg(long = "tick", value_name = "INDEX")]
    pub ticks: Vec<usize>,

    /// Player slot that resigns to the observer (repeatable)
    #[arg(long, value_name = "PLAYER")]
    pub resign: Vec<u32>,

    /// Output path (defaults to <stem>_obs.rcx next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// `<stem>_obs.rcx` in the input's directory
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}.rcx"))
}

fn observer_options(args: &AddObserverArgs) -> ObserverOptions {
    let parse = super::parse_options(args.legacy);
    let defaults = ObserverOptions::default();
    ObserverOptions {
        name: args.name.clone().unwrap_or(defaults.name),
        ticks: if args.ticks.is_empty() {
            defaults.ticks
        } else {
            args.ticks.clone()
        },
        resigning_players: if args.resign.is_empty() {
            defaults.resigning_players
        } else {
            args.resign.clone()
        },
        variant: parse.variant,
        sync_gate: parse.sync_gate,
    }
}

pub fn execute(args: AddObserverArgs) -> Result<()> {
    use console::style;

    let input = &args.file;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    if output == *input {
        anyhow::bail!("Refusing to overwrite the input file: {}", input.display());
    }

    let options = observer_options(&args);
    let raw = fs::read(input).with_context(|| format!("Failed to read file: {}", input.display()))?;
    let injection = ObserverInjector::new(options.clone())
        .inject(&raw)
        .with_context(|| format!("Failed to add observer to: {}", input.display()))?;

    fs::write(&output, &injection.bytes)
        .with_context(|| format!("Failed to write file: {}", output.display()))?;
    log::info!(
        "Patched ticks {:?}, {} -> {} bytes",
        injection.patched_ticks,
        raw.len(),
        injection.bytes.len()
    );

    println!(
        "✓ Added observer '{}' as player {} → {}",
        style(&options.name).yellow(),
        style(injection.observer_id).green(),
        style(output.display()).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("replays/game 1.rcx")),
            PathBuf::from("replays/game 1_obs.rcx")
        );
        assert_eq!(
            default_output_path(Path::new("game")),
            PathBuf::from("game_obs.rcx")
        );
    }

    #[test]
    fn test_empty_lists_fall_back_to_defaults() {
        let args = AddObserverArgs {
            file: PathBuf::from("game.rcx"),
            name: None,
            legacy: true,
            ticks: Vec::new(),
            resign: vec![2, 3],
            output: None,
        };
        let options = observer_options(&args);
        assert_eq!(options.name, "Observer");
        assert_eq!(options.ticks, vec![4]);
        assert_eq!(options.resigning_players, vec![2, 3]);
        assert_eq!(options.variant, aom_rcx::EngineVariant::Legacy);
    }
}

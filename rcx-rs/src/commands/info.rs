//! `info` command: summarize a recording

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use aom_rcx::{Container, RecordingReader, Session};

use crate::utils::{
    format_bytes, format_compression_ratio, format_game_time, player_table, team_table,
};

#[derive(Args)]
pub struct InfoArgs {
    /// Path to the recording
    pub file: PathBuf,

    /// Decode with the legacy engine layout
    #[arg(long)]
    pub legacy: bool,
}

pub fn execute(args: InfoArgs) -> Result<()> {
    use console::style;

    let path = &args.file;
    let raw = fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let container = Container::decode(&raw)
        .with_context(|| format!("Failed to decode recording: {}", path.display()))?;
    let footer = container
        .parse_footer()
        .with_context(|| format!("Failed to parse footer: {}", path.display()))?;

    let options = super::parse_options(args.legacy);
    let mut reader = RecordingReader::new(&container.body, options)
        .with_context(|| format!("Failed to parse header: {}", path.display()))?;

    let mut commands = 0;
    let mut failure = None;
    for update in reader.by_ref() {
        match update {
            Ok(update) => commands += update.present_commands().count(),
            Err(e) => failure = Some(e),
        }
    }
    let ticks = reader.ticks_read();
    let (header, session) = reader.into_parts();

    println!("\n{}", style("Recording Information").bold().underlined());
    println!("File: {}", style(path.display()).cyan());
    println!("Engine: {}", style(options.variant).yellow());
    println!(
        "Size: {} ({} body, {} saved)",
        style(format_bytes(raw.len() as u64)).green(),
        format_bytes(container.body.len() as u64),
        format_compression_ratio(container.body.len() as u64, container.compressed_len as u64)
    );
    println!("Map script: {}", format_bytes(header.map_script.len() as u64));
    println!("Difficulty: {}", header.difficulty);
    println!("Ticks: {}", style(ticks).green());
    println!(
        "Duration: {}",
        style(format_game_time(session.clock_ms())).green()
    );
    println!("Commands: {}", style(commands).green());
    println!(
        "Sync checks: {}",
        if footer.sync_checks_enabled() {
            style("enabled").green()
        } else {
            style("disabled").dim()
        }
    );

    print_players(&session);
    print_teams(&session);

    if let Some(err) = failure {
        println!(
            "\n{} update stream stopped after {} ticks",
            style("Warning:").yellow().bold(),
            ticks
        );
        return Err(err)
            .with_context(|| format!("Failed to decode updates: {}", path.display()));
    }
    Ok(())
}

fn print_players(session: &Session) {
    use console::style;

    println!("\n{}", style("Players").bold());
    player_table(session).printstd();
}

fn print_teams(session: &Session) {
    use console::style;

    if session.teams().is_empty() {
        return;
    }
    println!("\n{}", style("Teams").bold());
    team_table(session).printstd();
}

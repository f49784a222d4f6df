//! Shared fixtures for the integration tests

#![allow(dead_code)]

use aom_rcx::commands::{
    BuildCommand, CommonHeader, MarketCommand, PlayerDisconnectCommand, ResearchCommand,
    TrainCommand, Vector3,
};
use aom_rcx::container::encode_with_footer;
use aom_rcx::cursor::ByteWriter;
use aom_rcx::{Footer, Header, ParseOptions, RecordingBuilder, Update};

/// Route library logging to the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Common header of a command issued by `player`
pub fn issued_by(player: i32) -> CommonHeader {
    CommonHeader {
        sequence: 3,
        player,
        unknown_28: 0,
        ai: -1,
        recipients: vec![1, 2],
        waypoints: vec![Vector3::new(10, 0, 20)],
        flag_bytes: vec![1],
        event: -1,
        plan: -1,
        ..CommonHeader::default()
    }
}

/// A varied tick stream: commands on even ticks, idle odd ticks
pub fn game_updates(ticks: usize) -> Vec<Update> {
    (0..ticks)
        .map(|i| {
            let update = Update::new(50 + (i % 7) as u32);
            match i % 4 {
                0 => update
                    .with_command(TrainCommand {
                        header: issued_by(1),
                        proto_unit_id: 11,
                        action: 1,
                        army_id: u32::MAX,
                    })
                    .with_selected_units(vec![100, 101])
                    .with_affected_players(vec![1]),
                2 => update
                    .with_command(ResearchCommand {
                        header: issued_by(2),
                        tech_id: 5,
                        unknown_b0: 0,
                    })
                    .with_command(BuildCommand {
                        header: issued_by(2),
                        proto_unit_id: 80,
                        position: Vector3::new(1, 2, 3),
                        facing: Vector3::new(0, 0, 1),
                        resource_id: u32::MAX,
                        unknown_cc: 0,
                    })
                    .with_affected_players(vec![2]),
                _ => update,
            }
        })
        .collect()
}

/// Two players on opposite teams plus nature, with `ticks` updates
pub fn two_player_game(ticks: usize) -> RecordingBuilder {
    RecordingBuilder::new()
        .map_script(b"include \"mmm_eyecandy\";\nvoid main() {}\n".to_vec())
        .player("Arkantos", 1, 0)
        .player("Amanra", 10, 1)
        .team(0, "Team 1")
        .team(1, "Team 2")
        .difficulty(2)
        .updates(game_updates(ticks))
}

/// A game whose last tick trades at the market and then disconnects
/// player 2
pub fn disconnect_game() -> RecordingBuilder {
    two_player_game(6).update(
        Update::new(1000)
            .with_command(MarketCommand {
                header: issued_by(2),
                resource: 1,
                unknown_b0: 0,
                amount: 100,
            })
            .with_command(PlayerDisconnectCommand {
                player_id: 2,
                header: issued_by(2),
            }),
    )
}

/// Encode a hand-built header and updates into a complete file
pub fn encode_recording(header: &Header, updates: &[Update], options: &ParseOptions) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    header.write(&mut writer).unwrap();
    for update in updates {
        update.write(&mut writer, options).unwrap();
    }
    encode_with_footer(&writer.into_inner(), &mut Footer::default()).unwrap()
}

/// Byte spans of every tick in a decompressed body
pub fn tick_spans(body: &[u8], options: ParseOptions) -> Vec<(usize, usize)> {
    let mut reader = aom_rcx::RecordingReader::new(body, options).unwrap();
    let mut spans = Vec::new();
    loop {
        let start = reader.position();
        match reader.next() {
            Some(update) => {
                update.unwrap();
                spans.push((start, reader.position()));
            }
            None => break,
        }
    }
    spans
}

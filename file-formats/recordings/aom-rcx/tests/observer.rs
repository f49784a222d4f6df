//! Observer injection against whole recordings

mod common;

use aom_rcx::commands::ResignCommand;
use aom_rcx::container::{Container, ENVELOPE_HEADER_SIZE};
use aom_rcx::cursor::ByteReader;
use aom_rcx::footer::Footer;
use aom_rcx::header::RELATION_NEUTRAL;
use aom_rcx::mutator::OBSERVER_ROSTER_ENTRY;
use aom_rcx::settings::{OBSERVER_TEAM, OBSERVER_TYPE_CODE};
use aom_rcx::{
    Command, EngineVariant, ErrorKind, Header, HeaderParser, LoadFlags, ObserverInjector,
    ObserverOptions, ParseOptions, Recording, RecordingBuilder, RosterEntry, SettingsDocument,
    inject_observer,
};
use pretty_assertions::assert_eq;

fn decode_header(raw: &[u8], options: ParseOptions) -> (Header, Vec<u8>) {
    let container = Container::decode(raw).unwrap();
    let header = HeaderParser::new(options)
        .parse(&mut ByteReader::new(&container.body))
        .unwrap();
    (header, container.body)
}

#[test]
fn test_two_player_header_gains_observer() {
    // Roster without a nature slot, settings without client indices
    let settings = "<GameSettings><NumPlayers>2</NumPlayers>\
        <Player><Name>Arkantos</Name><Team>0</Team></Player>\
        <Player><Name>Amanra</Name><Team>1</Team></Player>\
        </GameSettings>";
    let mut header = RecordingBuilder::new().settings_text(settings).header();
    header.roster = vec![
        RosterEntry {
            civilization: 1,
            team: 0,
        },
        RosterEntry {
            civilization: 10,
            team: 1,
        },
    ];
    header.attributes = vec![None, None];
    let updates = common::game_updates(6);
    let raw = common::encode_recording(&header, &updates, &ParseOptions::default());

    let output = inject_observer(&raw, &ObserverOptions::new("Stu")).unwrap();
    let (patched, _) = decode_header(&output, ParseOptions::default());

    assert_eq!(patched.settings.num_players().unwrap(), 3);
    assert_eq!(patched.roster.len(), 3);
    assert_eq!(&patched.roster[..2], &header.roster[..]);
    assert_eq!(patched.roster[2], OBSERVER_ROSTER_ENTRY);

    let players = patched.settings.players().unwrap();
    assert_eq!(players.len(), 3);
    let observer = &players[2];
    assert_eq!(observer.name.as_deref(), Some("Stu"));
    assert_eq!(observer.team, Some(OBSERVER_TEAM));
    assert_eq!(observer.player_type, Some(OBSERVER_TYPE_CODE));
    assert_eq!(observer.client_index, Some(2));
    assert_eq!(observer.controlled_player, Some(3));

    assert_eq!(patched.attributes.len(), 3);
    let entry = patched.attributes[2].as_ref().unwrap();
    assert_eq!(entry.name_lossy(), "Stu");
    assert!(entry.is_observer());
    let relations = entry.relations.as_ref().unwrap();
    assert_eq!(relations.len(), 16);
    assert_eq!(relations[2], 0);
    assert_eq!(relations[0], RELATION_NEUTRAL);

    // Everything else in the header survives
    assert_eq!(patched.preamble, header.preamble);
    assert_eq!(patched.map_script, header.map_script);
    assert_eq!(patched.teams, header.teams);
    assert_eq!(patched.difficulty, header.difficulty);
}

#[test]
fn test_settings_text_outside_splices_is_preserved() {
    let raw = common::two_player_game(6).build().unwrap();
    let before = Recording::from_bytes(&raw).unwrap();
    let output = inject_observer(&raw, &ObserverOptions::new("Stu")).unwrap();
    let after = Recording::from_bytes(&output).unwrap();

    let old = before.header.settings.text();
    let new = after.header.settings.text();
    let (head, tail) = old.split_once("<NumPlayers>2").unwrap();
    assert!(new.starts_with(&format!("{head}<NumPlayers>3")));
    let body = tail.strip_suffix("</GameSettings>").unwrap();
    assert!(new.contains(body));
    assert!(new.ends_with("</Player></GameSettings>"));
}

#[test]
fn test_untouched_ticks_are_byte_identical() {
    common::init_logging();
    let options = ParseOptions::default();
    let raw = common::disconnect_game().build().unwrap();
    let injection = ObserverInjector::new(ObserverOptions {
        ticks: vec![2, 4],
        ..ObserverOptions::new("Stu")
    })
    .inject(&raw)
    .unwrap();
    assert_eq!(injection.patched_ticks, vec![2, 4]);

    let input = Container::decode(&raw).unwrap().body;
    let output = Container::decode(&injection.bytes).unwrap().body;
    let before = common::tick_spans(&input, options);
    let after = common::tick_spans(&output, options);
    assert_eq!(before.len(), after.len());

    for (tick, (&(a0, a1), &(b0, b1))) in before.iter().zip(&after).enumerate() {
        if tick == 2 || tick == 4 {
            assert!(b1 - b0 > a1 - a0, "tick {tick} did not grow");
        } else {
            assert_eq!(&input[a0..a1], &output[b0..b1], "tick {tick} changed");
        }
    }
}

#[test]
fn test_patched_tick_contents() {
    let raw = common::two_player_game(8).build().unwrap();
    let before = Recording::from_bytes(&raw).unwrap();
    let options = ObserverOptions {
        resigning_players: vec![1, 2],
        ..ObserverOptions::new("Stu")
    };
    let after = Recording::from_bytes(&inject_observer(&raw, &options).unwrap()).unwrap();

    let original = &before.updates[4];
    let patched = &after.updates[4];
    assert!(patched.flags.contains(LoadFlags::FEW_COMMANDS));
    assert_eq!(patched.commands.len(), original.commands.len() + 2);
    assert_eq!(
        patched.commands[..2],
        [
            Some(Command::Resign(ResignCommand::synthetic(1, 3))),
            Some(Command::Resign(ResignCommand::synthetic(2, 3))),
        ]
    );
    assert_eq!(patched.commands[2..], original.commands[..]);
    assert_eq!(patched.selected_units, original.selected_units);
    assert_eq!(patched.affected_players[0], 3);
    assert_eq!(patched.affected_players[1..], original.affected_players[..]);
    assert_eq!(patched.sync_marker, original.sync_marker);
    assert_eq!(patched.elapsed_ms, original.elapsed_ms);

    assert_eq!(after.duration_ms(), before.duration_ms());
    assert!(after.session.players()[1].is_resigned());
    assert!(after.session.players()[2].is_resigned());
    assert!(after.session.players()[3].is_observer);
}

#[test]
fn test_footer_is_repaired() {
    common::init_logging();
    let body = common::two_player_game(6).build_body().unwrap();
    let mut footer = Footer::with_categories(0x1c);
    footer.opaque = [&[9u8, 8, 7][..], &footer.opaque[..]].concat();
    footer.auxiliary = 0x1234;
    let raw = aom_rcx::container::encode_with_footer(&body, &mut footer).unwrap();

    let output = inject_observer(&raw, &ObserverOptions::default()).unwrap();
    let container = Container::decode(&output).unwrap();
    let repaired = container.parse_footer().unwrap();

    assert_eq!(repaired.sync_categories, vec![0; 0x1c]);
    assert_eq!(repaired.opaque, footer.opaque);
    assert_eq!(repaired.auxiliary, 0x1234);
    assert_eq!(
        repaired.locator as usize,
        ENVELOPE_HEADER_SIZE + container.compressed_len
    );
    assert_eq!(
        u32::from_le_bytes([output[4], output[5], output[6], output[7]]) as usize,
        container.body.len()
    );
}

#[test]
fn test_legacy_recording() {
    let options = ParseOptions::for_variant(EngineVariant::Legacy);
    let settings = "<GameSettings><NumPlayers>1</NumPlayers>\
        <Player ClientID=\"0\"><Name>Ajax</Name></Player></GameSettings>";
    let raw = RecordingBuilder::new()
        .options(options)
        .settings_text(settings)
        .player("Ajax", 2, 0)
        .updates(common::game_updates(5))
        .build()
        .unwrap();
    let (header, body) = decode_header(&raw, options);
    assert_eq!(header.preamble.len(), 1466);
    assert!(body.len() > 1466);

    let output = inject_observer(
        &raw,
        &ObserverOptions {
            variant: EngineVariant::Legacy,
            ..ObserverOptions::new("Stu")
        },
    )
    .unwrap();
    let recording = Recording::from_bytes_with(&output, options).unwrap();
    assert!(recording.header.settings.text().contains("<Player ClientID=\"1\""));
    // One natural train command plus the synthetic resign
    assert_eq!(recording.updates[4].commands.len(), 2);
    assert_eq!(recording.session.player(2).unwrap().name, "Stu");
}

#[test]
fn test_failed_injection_produces_nothing() {
    let raw = common::two_player_game(6).build().unwrap();
    let mut damaged = raw.clone();
    damaged.truncate(raw.len() - 20);
    assert!(inject_observer(&damaged, &ObserverOptions::default()).is_err());

    let settings = SettingsDocument::from_text("<GameSettings><Filename>x</Filename></GameSettings>");
    let raw = common::two_player_game(6).settings(settings).build().unwrap();
    let err = inject_observer(&raw, &ObserverOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_without_target_ticks_only_the_header_changes() {
    let raw = common::two_player_game(6).build().unwrap();
    let options = ObserverOptions {
        ticks: Vec::new(),
        ..ObserverOptions::default()
    };
    let injection = ObserverInjector::new(options).inject(&raw).unwrap();
    assert!(injection.patched_ticks.is_empty());

    let before = Recording::from_bytes(&raw).unwrap();
    let after = Recording::from_bytes(&injection.bytes).unwrap();
    assert_eq!(after.updates, before.updates);
    assert_eq!(after.header.roster.len(), before.header.roster.len() + 1);
}

#[test]
fn test_player_count_must_match_roster() {
    let settings = "<GameSettings><NumPlayers>5</NumPlayers>\
        <Player ClientIndex=\"0\"><Name>Arkantos</Name></Player>\
        <Player ClientIndex=\"1\"><Name>Amanra</Name></Player>\
        </GameSettings>";
    let raw = common::two_player_game(6)
        .settings_text(settings)
        .build()
        .unwrap();
    assert!(Recording::from_bytes(&raw).is_ok());

    let err = inject_observer(&raw, &ObserverOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn test_resigning_players_are_deduplicated() {
    let raw = common::two_player_game(6).build().unwrap();
    let options = ObserverOptions {
        resigning_players: vec![2, 2, 1],
        ..ObserverOptions::new("Stu")
    };
    let recording = Recording::from_bytes(&inject_observer(&raw, &options).unwrap()).unwrap();
    let tick = &recording.updates[4];
    assert_eq!(tick.commands.len(), 3);
    assert_eq!(
        tick.commands[0],
        Some(Command::Resign(ResignCommand::synthetic(2, 3)))
    );
    assert_eq!(
        tick.commands[1],
        Some(Command::Resign(ResignCommand::synthetic(1, 3)))
    );
}

#[test]
fn test_nature_player_cannot_resign() {
    let raw = common::two_player_game(6).build().unwrap();
    let options = ObserverOptions {
        resigning_players: vec![0],
        ..ObserverOptions::default()
    };
    let err = inject_observer(&raw, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

//! Observer injection.
//!
//! The mutator walks the body with the same step functions the decoder uses,
//! echoing every consumed byte to a new body. It departs from a plain echo
//! in a handful of places:
//!
//! - the settings document gains an observer `Player` element
//! - both player tables gain an entry for the observer
//! - each target tick gains one synthetic resign per resigning player, and
//!   the observer joins that tick's affected player list
//!
//! Ticks after the last target are copied without decoding. The footer keeps
//! its category count with every category switched off, and its locator is
//! pointed at the new compressed body end.

use crate::commands::{Command, ResignCommand, read_command_slot};
use crate::container::{Container, encode_with_footer};
use crate::cursor::{EchoReader, WireRead};
use crate::error::{Error, Result, Unsupported};
use crate::header::{
    HeaderParser, PlayerAttributes, RosterEntry, write_attribute_slot, write_roster_entry,
};
use crate::options::{EngineVariant, ParseOptions, SyncGate};
use crate::section::{read_section, write_section};
use crate::settings::SettingsDocument;
use crate::update::{LoadFlags, TickDecoder};
use std::collections::BTreeSet;

/// Roster pair written for the observer
pub const OBSERVER_ROSTER_ENTRY: RosterEntry = RosterEntry {
    civilization: 1,
    team: -1,
};

/// Settings for one observer injection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverOptions {
    /// Observer display name
    pub name: String,
    /// Zero-based indices of the ticks that receive synthetic resigns
    pub ticks: Vec<usize>,
    /// Player slots that resign to the observer
    pub resigning_players: Vec<u32>,
    /// Engine family of the input
    pub variant: EngineVariant,
    /// Sync marker gating of the input
    pub sync_gate: SyncGate,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            name: "Observer".to_string(),
            ticks: vec![4],
            resigning_players: vec![1],
            variant: EngineVariant::default(),
            sync_gate: SyncGate::default(),
        }
    }
}

impl ObserverOptions {
    /// Default options with the given observer name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Decoder options matching the input
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            variant: self.variant,
            sync_gate: self.sync_gate,
        }
    }
}

/// Result of an injection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Complete output file
    pub bytes: Vec<u8>,
    /// Player slot assigned to the observer
    pub observer_id: u32,
    /// Ticks that received synthetic commands
    pub patched_ticks: Vec<usize>,
}

/// Adds an observer to recordings
#[derive(Debug, Clone, Default)]
pub struct ObserverInjector {
    options: ObserverOptions,
}

impl ObserverInjector {
    /// Create an injector
    pub fn new(options: ObserverOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Inject the observer into a complete recording file.
    ///
    /// Nothing is returned unless the whole pass succeeds.
    pub fn inject(&self, raw: &[u8]) -> Result<Injection> {
        let container = Container::decode(raw)?;
        let mut footer = container.parse_footer()?;

        let (body, observer_id, patched_ticks) = self.inject_body(&container.body)?;

        footer.disable_sync_checks();
        let bytes = encode_with_footer(&body, &mut footer)?;
        log::debug!(
            "Observer injected: body {} -> {} bytes, {} sync categories disabled, locator 0x{:x}",
            container.body.len(),
            body.len(),
            footer.sync_categories.len(),
            footer.locator
        );
        Ok(Injection {
            bytes,
            observer_id,
            patched_ticks,
        })
    }

    /// Inject the observer into a decompressed body.
    ///
    /// Returns the new body, the observer's player slot and the ticks that
    /// received synthetic commands.
    pub fn inject_body(&self, body: &[u8]) -> Result<(Vec<u8>, u32, Vec<usize>)> {
        let parse = self.options.parse_options();
        let mut echo = EchoReader::new(body);
        let resigning = self.resigning_players()?;

        let observer_id = self.inject_header(&mut echo, &HeaderParser::new(parse), &resigning)?;
        log::debug!(
            "Update stream starts at 0x{:x} (0x{:x} in output)",
            echo.position(),
            echo.output().len()
        );

        let targets: BTreeSet<usize> = self.options.ticks.iter().copied().collect();
        let mut patched = Vec::with_capacity(targets.len());
        if let Some(&last) = targets.last() {
            let decoder = TickDecoder::new(parse);
            for tick in 0..=last {
                if echo.remaining() == 0 {
                    return Err(Error::format(
                        echo.position(),
                        format!("recording ends after {tick} ticks, before injection tick {last}"),
                    ));
                }
                if targets.contains(&tick) {
                    self.inject_tick(&mut echo, &decoder, observer_id, &resigning)
                        .map_err(|e| e.in_tick(tick))?;
                    patched.push(tick);
                } else {
                    decoder
                        .read_update(&mut echo)
                        .map_err(|e| e.in_tick(tick))?;
                }
            }
        }

        let copied = echo.copy_remaining();
        log::trace!("Copied {copied} trailing update bytes verbatim");
        Ok((echo.into_output(), observer_id, patched))
    }

    /// Resigning player slots in first-seen order, without repeats. Slot 0
    /// is the nature player and cannot resign.
    fn resigning_players(&self) -> Result<Vec<u32>> {
        let mut seen = BTreeSet::new();
        let mut players = Vec::with_capacity(self.options.resigning_players.len());
        for &player in &self.options.resigning_players {
            if player == 0 {
                return Err(Error::consistency(
                    "player slot 0 is the nature player and cannot resign",
                ));
            }
            if seen.insert(player) {
                players.push(player);
            } else {
                log::debug!("Resigning player {player} listed more than once");
            }
        }
        Ok(players)
    }

    fn inject_header(
        &self,
        echo: &mut EchoReader<'_>,
        parser: &HeaderParser,
        resigning: &[u32],
    ) -> Result<u32> {
        parser.read_preamble(echo)?;

        let settings = SettingsDocument::decode(&read_section(echo.input_mut())?)?;
        let (settings, num_players) = settings.with_observer(&self.options.name, parser.variant())?;
        write_section(echo.output_mut(), &settings.encode())?;

        // Map script
        read_section(echo)?;

        let roster_count = parser.read_roster_count(echo.input_mut())?;
        let observer_id = u32::try_from(roster_count)
            .map_err(|_| Error::encode(format!("roster of {roster_count} players")))?;
        // The roster either matches the declared count or carries one extra
        // slot for the nature player
        let declared = num_players - 1;
        if observer_id != declared && observer_id != num_players {
            return Err(Error::consistency(format!(
                "settings document declares {declared} players, roster holds {roster_count}"
            )));
        }
        for &player in resigning {
            if player as usize >= roster_count {
                return Err(Error::consistency(format!(
                    "resigning player {player} outside roster of {roster_count}"
                )));
            }
        }

        echo.output_mut()
            .write_count(roster_count + 1, "roster entry")?;
        parser.read_roster_entries(echo, roster_count)?;
        write_roster_entry(echo.output_mut(), &OBSERVER_ROSTER_ENTRY);

        parser.read_unidentified(echo)?;
        // Difficulty
        echo.read_u32()?;
        parser.read_teams(echo)?;

        let attribute_count = parser.read_attribute_count(echo.input_mut(), roster_count)?;
        echo.output_mut()
            .write_count(attribute_count + 1, "attribute entry")?;
        parser.read_attribute_entries(echo, attribute_count)?;
        let observer = PlayerAttributes::observer(&self.options.name, observer_id);
        write_attribute_slot(echo.output_mut(), Some(&observer))?;

        log::debug!(
            "Header patched: observer '{}' at slot {}",
            self.options.name,
            observer_id
        );
        Ok(observer_id)
    }

    fn inject_tick(
        &self,
        echo: &mut EchoReader<'_>,
        decoder: &TickDecoder,
        observer_id: u32,
        resigning: &[u32],
    ) -> Result<()> {
        let flags = decoder.read_flags(echo.input_mut())?;
        echo.output_mut()
            .write_u8((flags | LoadFlags::FEW_COMMANDS).bits());
        decoder.read_camera(echo, flags)?;
        decoder.read_elapsed(echo, flags)?;

        let count_at = echo.position();
        let natural = decoder.read_command_count(echo.input_mut(), flags)?;
        let synthetic: Vec<Command> = resigning
            .iter()
            .map(|&player| ResignCommand::synthetic(player, observer_id).into())
            .collect();
        let total = u8::try_from(natural + synthetic.len()).map_err(|_| {
            Error::unsupported(
                count_at,
                Unsupported::CommandCountOverflow {
                    existing: natural as u8,
                    added: synthetic.len(),
                },
            )
        })?;
        echo.output_mut().write_u8(total);
        for command in &synthetic {
            command.write(echo.output_mut())?;
        }
        for _ in 0..natural {
            read_command_slot(echo)?;
        }

        decoder.read_selected_units(echo, flags)?;

        let affected = decoder.read_affected_players(echo.input_mut())?;
        let observer = u8::try_from(observer_id)
            .map_err(|_| Error::encode(format!("observer id {observer_id} in a one-byte list")))?;
        let affected_count = u8::try_from(affected.len() + 1).map_err(|_| {
            Error::encode(format!("{} affected players in a one-byte count", affected.len() + 1))
        })?;
        let output = echo.output_mut();
        output.write_u8(affected_count);
        output.write_u8(observer);
        output.write_bytes(&affected);

        decoder.read_sync(echo, flags)?;
        log::trace!(
            "Tick patched: {} synthetic + {} natural commands",
            synthetic.len(),
            natural
        );
        Ok(())
    }
}

/// Inject an observer into a complete recording file
pub fn inject_observer(raw: &[u8], options: &ObserverOptions) -> Result<Vec<u8>> {
    ObserverInjector::new(options.clone())
        .inject(raw)
        .map(|injection| injection.bytes)
}

//! Players and teams of one parse, plus the state the update stream changes.

use crate::commands::Command;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::update::Update;
use std::collections::BTreeMap;

/// Civilization id of the nature placeholder player
pub const NATURE_CIVILIZATION: i32 = 22;

/// One player slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    /// Slot index; 0 is nature
    pub index: usize,
    /// Civilization id
    pub civilization: i32,
    /// Team id, -1 for none
    pub team: i32,
    /// Resolved display name, empty when unknown
    pub name: String,
    /// Whether the slot is an observer
    pub is_observer: bool,
    /// Session clock at which the player resigned or disconnected
    pub resigned_at_ms: Option<u64>,
}

impl PlayerRecord {
    /// Whether the player has resigned or disconnected
    pub fn is_resigned(&self) -> bool {
        self.resigned_at_ms.is_some()
    }

    /// Whether the player counts as a member of its team
    pub fn is_team_member(&self) -> bool {
        self.civilization != NATURE_CIVILIZATION && !self.name.is_empty()
    }
}

/// One team and the slots that belong to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRecord {
    /// Team id
    pub id: i32,
    /// Team name, empty for teams without a descriptor
    pub name: String,
    /// Member slot indices into [`Session::players`]
    pub members: Vec<usize>,
}

impl TeamRecord {
    /// Every member has resigned
    pub fn is_lost(&self, players: &[PlayerRecord]) -> bool {
        !self.members.is_empty() && self.member_records(players).all(PlayerRecord::is_resigned)
    }

    /// Every member is an observer
    pub fn is_observing_team(&self, players: &[PlayerRecord]) -> bool {
        !self.members.is_empty() && self.member_records(players).all(|p| p.is_observer)
    }

    /// Member records, in slot order
    pub fn member_records<'a>(
        &'a self,
        players: &'a [PlayerRecord],
    ) -> impl Iterator<Item = &'a PlayerRecord> + 'a {
        self.members.iter().filter_map(|&index| players.get(index))
    }
}

/// Roster and clock for one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    players: Vec<PlayerRecord>,
    teams: Vec<TeamRecord>,
    clock_ms: u64,
    ticks: usize,
}

impl Session {
    /// Build the roster from a decoded header.
    ///
    /// The attribute table supersedes the first roster; names fall back to
    /// the settings document when the attribute entry carries none.
    pub fn from_header(header: &Header) -> Result<Self> {
        let mut players: Vec<PlayerRecord> = header
            .roster
            .iter()
            .enumerate()
            .map(|(index, entry)| PlayerRecord {
                index,
                civilization: entry.civilization,
                team: entry.team,
                name: String::new(),
                is_observer: false,
                resigned_at_ms: None,
            })
            .collect();

        for element in header.settings.players()? {
            let Some(client_index) = element.client_index else {
                continue;
            };
            let slot = client_index
                .checked_add(1)
                .and_then(|slot| usize::try_from(slot).ok())
                .filter(|&slot| slot < players.len())
                .ok_or_else(|| {
                    Error::consistency(format!(
                        "settings player index {client_index} outside roster of {}",
                        players.len()
                    ))
                })?;
            let player = &mut players[slot];
            player.is_observer |= element.is_observer();
            if let Some(name) = element.name.filter(|n| !n.is_empty()) {
                player.name = name;
            }
        }

        for (player, attributes) in players.iter_mut().zip(&header.attributes) {
            let Some(attributes) = attributes else {
                continue;
            };
            player.civilization = attributes.civilization as i32;
            player.team = attributes.team;
            let name = attributes.name_lossy();
            if !name.is_empty() {
                player.name = name;
            }
            player.is_observer |= attributes.is_observer();
        }

        let mut names: BTreeMap<i32, String> = BTreeMap::new();
        for team in header.teams.iter().flatten() {
            names.entry(team.id).or_insert_with(|| team.name_lossy());
        }
        for player in &players {
            if player.team >= 0 && player.is_team_member() {
                names.entry(player.team).or_default();
            }
        }
        let teams = names
            .into_iter()
            .map(|(id, name)| TeamRecord {
                id,
                name,
                members: players
                    .iter()
                    .filter(|p| p.team == id && p.is_team_member())
                    .map(|p| p.index)
                    .collect(),
            })
            .collect::<Vec<_>>();

        log::debug!(
            "Session: {} player slots, {} teams",
            players.len(),
            teams.len()
        );
        Ok(Self {
            players,
            teams,
            clock_ms: 0,
            ticks: 0,
        })
    }

    /// Apply one tick: advance the clock and record departures
    pub fn observe(&mut self, update: &Update) {
        self.clock_ms += u64::from(update.elapsed_ms);
        self.ticks += 1;

        for command in update.present_commands() {
            let departed = match command {
                Command::Resign(resign) => resign.header.player,
                Command::PlayerDisconnect(disconnect) => disconnect.player_id as i32,
                _ => continue,
            };
            let clock = self.clock_ms;
            match usize::try_from(departed)
                .ok()
                .and_then(|index| self.players.get_mut(index))
            {
                Some(player) if player.resigned_at_ms.is_none() => {
                    log::debug!(
                        "Player {} ({}) left at {} ms",
                        player.index,
                        player.name,
                        clock
                    );
                    player.resigned_at_ms = Some(clock);
                }
                Some(_) => {}
                None => log::debug!("{} for unknown player {departed}", command.kind().name()),
            }
        }
    }

    /// Player slots, including nature
    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    /// Player slot by index
    pub fn player(&self, index: usize) -> Option<&PlayerRecord> {
        self.players.get(index)
    }

    /// Teams, ordered by id
    pub fn teams(&self) -> &[TeamRecord] {
        &self.teams
    }

    /// Running sum of tick durations
    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Ticks observed so far
    pub fn ticks(&self) -> usize {
        self.ticks
    }
}

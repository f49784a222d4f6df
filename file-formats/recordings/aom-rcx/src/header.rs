//! One-time header that precedes the update stream.
//!
//! ```text
//! preamble            fixed length, opaque (see EngineVariant)
//! section             settings document (UTF-16 XML)
//! section             map script
//! u32 count           roster: (i32 civilization, i32 team) per player
//! 13 bytes            unidentified
//! u32                 difficulty
//! u32 count           team descriptors
//! u32 count           player attributes, count must match the roster
//! ```
//!
//! Player slot 0 in both player tables is the nature player.

use crate::cursor::{ByteWriter, WireRead};
use crate::error::{Error, Result};
use crate::options::{EngineVariant, ParseOptions};
use crate::section::{read_section, write_section};
use crate::settings::{OBSERVER_TYPE_CODE, SettingsDocument};

/// Size of the unidentified region after the roster
pub const UNIDENTIFIED_LEN: usize = 13;

/// Attribute entry version from which a relation list is present
pub const RELATIONS_MIN_VERSION: i32 = 0x3f;

/// Largest relation list the engine accepts
pub const MAX_RELATIONS: usize = 16;

/// Relation value written for every other player in a new observer entry
pub const RELATION_NEUTRAL: u32 = 2;

/// First player table: civilization and team per player slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterEntry {
    /// Civilization id
    pub civilization: i32,
    /// Team id, -1 for none
    pub team: i32,
}

/// One entry of the team table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamDescriptor {
    /// Unidentified word before the team id
    pub unknown_1: u32,
    /// Team id
    pub id: i32,
    /// Raw team name bytes
    pub name: Vec<u8>,
    /// Count-prefixed list following the name
    pub entries: Vec<u32>,
}

impl TeamDescriptor {
    /// Team name decoded as UTF-8, replacing invalid sequences
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    fn read<R: WireRead>(reader: &mut R) -> Result<Self> {
        let unknown_1 = reader.read_u32()?;
        let id = reader.read_i32()?;
        let len = reader.read_count(1)?;
        let name = reader.read_bytes(len)?;
        let count = reader.read_count(4)?;
        let entries = (0..count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            unknown_1,
            id,
            name,
            entries,
        })
    }

    fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u32(self.unknown_1);
        writer.write_i32(self.id);
        writer.write_count(self.name.len(), "team name byte")?;
        writer.write_bytes(&self.name);
        writer.write_count(self.entries.len(), "team entry")?;
        for entry in &self.entries {
            writer.write_u32(*entry);
        }
        Ok(())
    }
}

/// Second, authoritative player table entry.
///
/// Fields named `unknown_*` keep the approximate engine structure offset
/// they were found at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerAttributes {
    /// Entry version; gates the relation list
    pub version: i32,
    /// Unidentified flag byte
    pub flag_1: u8,
    /// Unidentified flag byte
    pub flag_2: u8,
    /// Default stance
    pub stance: u32,
    /// Player name as UTF-16 code units
    pub name: Vec<u16>,
    /// Unidentified word
    pub unknown_10: u32,
    /// Player type code; 4 marks an observer
    pub type_code: u8,
    /// Culture id
    pub culture: u32,
    /// Civilization id
    pub civilization: u32,
    /// Team id, -1 for none
    pub team: i32,
    /// Unidentified word
    pub unknown_4b4: u32,
    /// Unidentified word
    pub unknown_4b8: u32,
    /// Starting relations towards each player slot; `None` below
    /// [`RELATIONS_MIN_VERSION`]
    pub relations: Option<Vec<u32>>,
    /// Negative relation count stored in place of an empty list, kept so
    /// the entry encodes back unchanged
    pub negative_relation_count: Option<i32>,
    /// Player color
    pub color: u32,
}

impl PlayerAttributes {
    /// Name decoded from UTF-16, replacing invalid sequences
    pub fn name_lossy(&self) -> String {
        String::from_utf16_lossy(&self.name)
    }

    /// Whether the entry describes an observer
    pub fn is_observer(&self) -> bool {
        u32::from(self.type_code) == OBSERVER_TYPE_CODE
    }

    /// Entry for an injected observer at player slot `observer_id`
    pub fn observer(name: &str, observer_id: u32) -> Self {
        let relations = (0..MAX_RELATIONS as u32)
            .map(|slot| if slot == observer_id { 0 } else { RELATION_NEUTRAL })
            .collect();
        Self {
            version: 75,
            flag_1: 0,
            flag_2: 0,
            stance: 0,
            name: name.encode_utf16().collect(),
            unknown_10: 0,
            type_code: OBSERVER_TYPE_CODE as u8,
            culture: 2,
            civilization: 6,
            team: -1,
            unknown_4b4: 0x3f80_0000,
            unknown_4b8: 0,
            relations: Some(relations),
            negative_relation_count: None,
            color: 3,
        }
    }

    /// Decode the fields following a non-zero presence byte
    pub fn read<R: WireRead>(reader: &mut R) -> Result<Self> {
        let version = reader.read_i32()?;
        let flag_1 = reader.read_u8()?;
        let flag_2 = reader.read_u8()?;
        let stance = reader.read_u32()?;
        let units = reader.read_count(2)?;
        let name = (0..units)
            .map(|_| reader.read_u16())
            .collect::<Result<Vec<_>>>()?;
        let unknown_10 = reader.read_u32()?;
        let type_code = reader.read_u8()?;
        let culture = reader.read_u32()?;
        let civilization = reader.read_u32()?;
        let team = reader.read_i32()?;
        let unknown_4b4 = reader.read_u32()?;
        let unknown_4b8 = reader.read_u32()?;

        let mut negative_relation_count = None;
        let relations = if version >= RELATIONS_MIN_VERSION {
            let offset = reader.position();
            let count = reader.read_i32()?;
            if count > MAX_RELATIONS as i32 {
                return Err(Error::format(
                    offset,
                    format!("{count} relations, at most {MAX_RELATIONS} allowed"),
                ));
            }
            if count < 0 {
                log::warn!("Negative relation count {count} at 0x{offset:x}, read as empty");
                negative_relation_count = Some(count);
            }
            let count = count.max(0);
            Some(
                (0..count)
                    .map(|_| reader.read_u32())
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };

        Ok(Self {
            version,
            flag_1,
            flag_2,
            stance,
            name,
            unknown_10,
            type_code,
            culture,
            civilization,
            team,
            unknown_4b4,
            unknown_4b8,
            relations,
            negative_relation_count,
            color: reader.read_u32()?,
        })
    }

    /// Encode the fields following the presence byte
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_i32(self.version);
        writer.write_u8(self.flag_1);
        writer.write_u8(self.flag_2);
        writer.write_u32(self.stance);
        writer.write_count(self.name.len(), "name code unit")?;
        for unit in &self.name {
            writer.write_u16(*unit);
        }
        writer.write_u32(self.unknown_10);
        writer.write_u8(self.type_code);
        writer.write_u32(self.culture);
        writer.write_u32(self.civilization);
        writer.write_i32(self.team);
        writer.write_u32(self.unknown_4b4);
        writer.write_u32(self.unknown_4b8);

        match (&self.relations, self.version >= RELATIONS_MIN_VERSION) {
            (Some(relations), true) => {
                if relations.len() > MAX_RELATIONS {
                    return Err(Error::encode(format!(
                        "{} relations, at most {MAX_RELATIONS} allowed",
                        relations.len()
                    )));
                }
                match self.negative_relation_count {
                    Some(count) if count < 0 && relations.is_empty() => writer.write_i32(count),
                    Some(count) => {
                        return Err(Error::encode(format!(
                            "relation count {count} kept alongside {} relations",
                            relations.len()
                        )));
                    }
                    None => writer.write_i32(relations.len() as i32),
                }
                for relation in relations {
                    writer.write_u32(*relation);
                }
            }
            (None, false) => {}
            (_, gated) => {
                return Err(Error::encode(format!(
                    "attribute version {} {} a relation list",
                    self.version,
                    if gated { "requires" } else { "cannot carry" }
                )));
            }
        }

        writer.write_u32(self.color);
        Ok(())
    }
}

/// Decoded header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Opaque configuration preamble
    pub preamble: Vec<u8>,
    /// Settings document
    pub settings: SettingsDocument,
    /// Raw map script
    pub map_script: Vec<u8>,
    /// First player table
    pub roster: Vec<RosterEntry>,
    /// Unidentified bytes after the roster
    pub unidentified: [u8; UNIDENTIFIED_LEN],
    /// Difficulty setting
    pub difficulty: u32,
    /// Team table; `None` for entries with a zero presence byte
    pub teams: Vec<Option<TeamDescriptor>>,
    /// Second player table; `None` for entries with a zero presence byte
    pub attributes: Vec<Option<PlayerAttributes>>,
}

impl Header {
    /// Number of player slots, including nature
    pub fn player_count(&self) -> usize {
        self.roster.len()
    }

    /// Encode the header
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        if self.attributes.len() != self.roster.len() {
            return Err(Error::consistency(format!(
                "{} attribute entries for {} roster entries",
                self.attributes.len(),
                self.roster.len()
            )));
        }
        writer.write_bytes(&self.preamble);
        write_section(writer, &self.settings.encode())?;
        write_section(writer, &self.map_script)?;

        writer.write_count(self.roster.len(), "roster entry")?;
        for entry in &self.roster {
            write_roster_entry(writer, entry);
        }
        writer.write_bytes(&self.unidentified);
        writer.write_u32(self.difficulty);

        writer.write_count(self.teams.len(), "team")?;
        for team in &self.teams {
            match team {
                Some(team) => {
                    writer.write_u8(1);
                    team.write(writer)?;
                }
                None => writer.write_u8(0),
            }
        }

        writer.write_count(self.attributes.len(), "attribute entry")?;
        for entry in &self.attributes {
            write_attribute_slot(writer, entry.as_ref())?;
        }
        Ok(())
    }
}

/// Encode one roster pair
pub fn write_roster_entry(writer: &mut ByteWriter, entry: &RosterEntry) {
    writer.write_i32(entry.civilization);
    writer.write_i32(entry.team);
}

/// Encode one attribute slot with its presence byte
pub fn write_attribute_slot(writer: &mut ByteWriter, entry: Option<&PlayerAttributes>) -> Result<()> {
    match entry {
        Some(entry) => {
            writer.write_u8(1);
            entry.write(writer)
        }
        None => {
            writer.write_u8(0);
            Ok(())
        }
    }
}

/// Step-wise header decoder.
///
/// [`HeaderParser::parse`] runs every step in order; the steps are public so
/// the mutator can replace individual fields while echoing the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderParser {
    options: ParseOptions,
}

impl HeaderParser {
    /// Create a parser for the given options
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Decode the whole header
    pub fn parse<R: WireRead>(&self, reader: &mut R) -> Result<Header> {
        let preamble = self.read_preamble(reader)?;
        let settings = SettingsDocument::decode(&read_section(reader)?)?;
        let map_script = read_section(reader)?;
        log::debug!("Map script: {} bytes", map_script.len());

        let count = self.read_roster_count(reader)?;
        let roster = self.read_roster_entries(reader, count)?;
        let unidentified = self.read_unidentified(reader)?;
        let difficulty = reader.read_u32()?;
        let teams = self.read_teams(reader)?;

        let attribute_count = self.read_attribute_count(reader, roster.len())?;
        let attributes = self.read_attribute_entries(reader, attribute_count)?;
        log::debug!(
            "Header: {} player slots, {} teams, difficulty {}",
            roster.len(),
            teams.iter().flatten().count(),
            difficulty
        );

        Ok(Header {
            preamble,
            settings,
            map_script,
            roster,
            unidentified,
            difficulty,
            teams,
            attributes,
        })
    }

    /// Read the fixed-length preamble
    pub fn read_preamble<R: WireRead>(&self, reader: &mut R) -> Result<Vec<u8>> {
        reader.read_bytes(self.options.variant.preamble_len())
    }

    /// Read the roster entry count
    pub fn read_roster_count<R: WireRead>(&self, reader: &mut R) -> Result<usize> {
        reader.read_count(8)
    }

    /// Read `count` roster pairs
    pub fn read_roster_entries<R: WireRead>(
        &self,
        reader: &mut R,
        count: usize,
    ) -> Result<Vec<RosterEntry>> {
        (0..count)
            .map(|_| {
                Ok(RosterEntry {
                    civilization: reader.read_i32()?,
                    team: reader.read_i32()?,
                })
            })
            .collect()
    }

    /// Read the unidentified region after the roster
    pub fn read_unidentified<R: WireRead>(&self, reader: &mut R) -> Result<[u8; UNIDENTIFIED_LEN]> {
        let mut region = [0u8; UNIDENTIFIED_LEN];
        region.copy_from_slice(reader.take(UNIDENTIFIED_LEN)?);
        Ok(region)
    }

    /// Read the count-prefixed team table, checking that team ids never
    /// decrease
    pub fn read_teams<R: WireRead>(&self, reader: &mut R) -> Result<Vec<Option<TeamDescriptor>>> {
        let count = reader.read_count(1)?;
        let mut teams = Vec::with_capacity(count);
        let mut last_id: Option<i32> = None;
        for _ in 0..count {
            let offset = reader.position();
            if reader.read_u8()? == 0 {
                teams.push(None);
                continue;
            }
            let team = TeamDescriptor::read(reader)?;
            if let Some(previous) = last_id.filter(|&previous| team.id < previous) {
                if self.options.variant.rejects_descending_teams() {
                    return Err(Error::consistency(format!(
                        "team id {} at 0x{offset:x} follows team id {previous}",
                        team.id
                    )));
                }
                log::warn!(
                    "Team id {} follows team id {} on a {} recording",
                    team.id,
                    previous,
                    self.options.variant
                );
            }
            last_id = Some(team.id);
            teams.push(Some(team));
        }
        Ok(teams)
    }

    /// Read the attribute table count and check it against the roster
    pub fn read_attribute_count<R: WireRead>(
        &self,
        reader: &mut R,
        roster_len: usize,
    ) -> Result<usize> {
        let count = reader.read_count(1)?;
        if count != roster_len {
            return Err(Error::consistency(format!(
                "attribute table declares {count} players, roster declares {roster_len}"
            )));
        }
        Ok(count)
    }

    /// Read `count` attribute slots
    pub fn read_attribute_entries<R: WireRead>(
        &self,
        reader: &mut R,
        count: usize,
    ) -> Result<Vec<Option<PlayerAttributes>>> {
        (0..count)
            .map(|_| {
                if reader.read_u8()? == 0 {
                    Ok(None)
                } else {
                    PlayerAttributes::read(reader).map(Some)
                }
            })
            .collect()
    }

    /// Engine family this parser decodes
    pub fn variant(&self) -> EngineVariant {
        self.options.variant
    }
}

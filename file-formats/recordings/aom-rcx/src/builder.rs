//! Assemble structurally valid recordings from typed parts.

use crate::container::encode_with_footer;
use crate::cursor::ByteWriter;
use crate::error::Result;
use crate::footer::Footer;
use crate::header::{Header, PlayerAttributes, RosterEntry, TeamDescriptor, UNIDENTIFIED_LEN};
use crate::options::{EngineVariant, ParseOptions};
use crate::session::NATURE_CIVILIZATION;
use crate::settings::SettingsDocument;
use crate::update::Update;
use quick_xml::escape::escape;

/// Builder for complete recording files.
///
/// Slot 0 of both player tables is pre-filled with the nature player.
///
/// # Examples
///
/// ```
/// use aom_rcx::{Recording, RecordingBuilder, Update};
///
/// let raw = RecordingBuilder::new()
///     .player("Arkantos", 1, 0)
///     .player("Gargarensis", 6, 1)
///     .update(Update::new(50))
///     .build()
///     .unwrap();
///
/// let recording = Recording::from_bytes(&raw).unwrap();
/// assert_eq!(recording.header.roster.len(), 3);
/// assert_eq!(recording.updates.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RecordingBuilder {
    options: ParseOptions,
    preamble: Option<Vec<u8>>,
    settings: Option<SettingsDocument>,
    map_script: Vec<u8>,
    roster: Vec<RosterEntry>,
    attributes: Vec<Option<PlayerAttributes>>,
    names: Vec<String>,
    unidentified: [u8; UNIDENTIFIED_LEN],
    difficulty: u32,
    teams: Vec<Option<TeamDescriptor>>,
    updates: Vec<Update>,
    footer: Footer,
}

impl Default for RecordingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBuilder {
    /// Start a recording holding only the nature player
    pub fn new() -> Self {
        Self {
            options: ParseOptions::default(),
            preamble: None,
            settings: None,
            map_script: Vec::new(),
            roster: vec![RosterEntry {
                civilization: NATURE_CIVILIZATION,
                team: -1,
            }],
            attributes: vec![Some(player_attributes(
                "Mother Nature",
                NATURE_CIVILIZATION as u32,
                -1,
                0,
            ))],
            names: Vec::new(),
            unidentified: [0; UNIDENTIFIED_LEN],
            difficulty: 0,
            teams: Vec::new(),
            updates: Vec::new(),
            footer: Footer::default(),
        }
    }

    /// Parse options the output must satisfy
    pub fn options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Engine family, with default sync gating
    pub fn variant(mut self, variant: EngineVariant) -> Self {
        self.options.variant = variant;
        self
    }

    /// Explicit preamble bytes; zeroes of the variant's length otherwise
    pub fn preamble(mut self, preamble: Vec<u8>) -> Self {
        self.preamble = Some(preamble);
        self
    }

    /// Use `text` as the settings document instead of generating one
    pub fn settings_text(mut self, text: impl Into<String>) -> Self {
        self.settings = Some(SettingsDocument::from_text(text));
        self
    }

    /// Use an already encoded settings document
    pub fn settings(mut self, settings: SettingsDocument) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Map script bytes
    pub fn map_script(mut self, script: impl Into<Vec<u8>>) -> Self {
        self.map_script = script.into();
        self
    }

    /// Add a player to both tables and the generated settings document
    pub fn player(mut self, name: &str, civilization: i32, team: i32) -> Self {
        let color = self.roster.len() as u32;
        self.roster.push(RosterEntry { civilization, team });
        self.attributes.push(Some(player_attributes(
            name,
            civilization as u32,
            team,
            color,
        )));
        self.names.push(name.to_string());
        self
    }

    /// Add a raw slot to both player tables without touching the settings
    /// document
    pub fn slot(mut self, entry: RosterEntry, attributes: Option<PlayerAttributes>) -> Self {
        self.roster.push(entry);
        self.attributes.push(attributes);
        self
    }

    /// Add a team descriptor
    pub fn team(mut self, id: i32, name: &str) -> Self {
        self.teams.push(Some(TeamDescriptor {
            unknown_1: 0,
            id,
            name: name.as_bytes().to_vec(),
            entries: Vec::new(),
        }));
        self
    }

    /// Difficulty setting
    pub fn difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Bytes of the unidentified region after the roster
    pub fn unidentified(mut self, region: [u8; UNIDENTIFIED_LEN]) -> Self {
        self.unidentified = region;
        self
    }

    /// Append one tick
    pub fn update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }

    /// Append several ticks
    pub fn updates(mut self, updates: impl IntoIterator<Item = Update>) -> Self {
        self.updates.extend(updates);
        self
    }

    /// Footer to append; its locator is filled in by [`Self::build`]
    pub fn footer(mut self, footer: Footer) -> Self {
        self.footer = footer;
        self
    }

    /// The header the builder will emit
    pub fn header(&self) -> Header {
        Header {
            preamble: self
                .preamble
                .clone()
                .unwrap_or_else(|| vec![0; self.options.variant.preamble_len()]),
            settings: self
                .settings
                .clone()
                .unwrap_or_else(|| self.generated_settings()),
            map_script: self.map_script.clone(),
            roster: self.roster.clone(),
            unidentified: self.unidentified,
            difficulty: self.difficulty,
            teams: self.teams.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Encode the decompressed body
    pub fn build_body(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::with_capacity(4096);
        self.header().write(&mut writer)?;
        for update in &self.updates {
            update.write(&mut writer, &self.options)?;
        }
        Ok(writer.into_inner())
    }

    /// Encode the complete file
    pub fn build(&self) -> Result<Vec<u8>> {
        let body = self.build_body()?;
        let mut footer = self.footer.clone();
        encode_with_footer(&body, &mut footer)
    }

    fn generated_settings(&self) -> SettingsDocument {
        let attribute = self.options.variant.player_index_attribute();
        let mut text = format!(
            "<GameSettings><Filename>builder</Filename><NumPlayers>{}</NumPlayers>",
            self.names.len()
        );
        // Named players occupy slots 1.. in insertion order
        for (index, (name, entry)) in self.names.iter().zip(&self.roster[1..]).enumerate() {
            text.push_str(&format!(
                "<Player {attribute}=\"{index}\" ControlledPlayer=\"{}\"><Name>{}</Name>\
                 <Type>0</Type><Team>{}</Team><Civilization>{}</Civilization></Player>",
                index + 1,
                escape(name.as_str()),
                entry.team,
                entry.civilization
            ));
        }
        text.push_str("</GameSettings>");
        SettingsDocument::from_text(text)
    }
}

fn player_attributes(name: &str, civilization: u32, team: i32, color: u32) -> PlayerAttributes {
    PlayerAttributes {
        version: 75,
        name: name.encode_utf16().collect(),
        culture: 0,
        civilization,
        team,
        unknown_4b4: 0x3f80_0000,
        relations: Some(Vec::new()),
        color,
        ..PlayerAttributes::default()
    }
}

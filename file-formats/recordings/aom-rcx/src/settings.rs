//! The game settings document embedded in the first body section.
//!
//! The document is UTF-16 XML. Only a handful of elements are interpreted:
//! the root's `NumPlayers` child and its `Player` children. Everything else
//! is kept as text so that rewriting the document changes nothing but the
//! spliced ranges.

use crate::error::{Error, Result};
use crate::options::EngineVariant;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

/// Player type code the engine uses for observers
pub const OBSERVER_TYPE_CODE: u32 = 4;

/// Team number observers are placed in
pub const OBSERVER_TEAM: i32 = 255;

const UTF16_LE_BOM: [u8; 2] = [0xff, 0xfe];
const UTF16_BE_BOM: [u8; 2] = [0xfe, 0xff];

/// Byte encoding the document was stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-16 little endian, optionally behind a byte-order mark
    Utf16Le {
        /// Whether a byte-order mark precedes the text
        bom: bool,
    },
    /// UTF-16 big endian behind a byte-order mark
    Utf16Be,
}

/// A `Player` element of the settings document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPlayer {
    /// Value of the `ClientIndex` or `ClientID` attribute
    pub client_index: Option<i64>,
    /// Value of the `ControlledPlayer` attribute
    pub controlled_player: Option<i64>,
    /// `Name` child text
    pub name: Option<String>,
    /// `Type` child text
    pub player_type: Option<u32>,
    /// `Team` child text
    pub team: Option<i32>,
    /// `Civilization` child text
    pub civilization: Option<u32>,
}

impl SettingsPlayer {
    /// Whether the element describes an observer
    pub fn is_observer(&self) -> bool {
        self.player_type == Some(OBSERVER_TYPE_CODE)
    }
}

/// Decoded settings document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDocument {
    text: String,
    encoding: TextEncoding,
}

impl SettingsDocument {
    /// Decode the raw section bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(Error::settings(format!(
                "odd byte length {} for UTF-16 text",
                bytes.len()
            )));
        }
        let (encoding, body) = if bytes.starts_with(&UTF16_LE_BOM) {
            (TextEncoding::Utf16Le { bom: true }, &bytes[2..])
        } else if bytes.starts_with(&UTF16_BE_BOM) {
            (TextEncoding::Utf16Be, &bytes[2..])
        } else {
            (TextEncoding::Utf16Le { bom: false }, bytes)
        };

        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| match encoding {
                TextEncoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
                TextEncoding::Utf16Le { .. } => u16::from_le_bytes([pair[0], pair[1]]),
            })
            .collect();
        let text = String::from_utf16(&units)
            .map_err(|e| Error::settings(format!("invalid UTF-16: {e}")))?;
        Ok(Self { text, encoding })
    }

    /// Build a document from text, stored as UTF-16LE behind a byte-order mark
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encoding: TextEncoding::Utf16Le { bom: true },
        }
    }

    /// Encode back to section bytes, keeping the original byte-order mark
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.text.len() * 2 + 2);
        match self.encoding {
            TextEncoding::Utf16Le { bom } => {
                if bom {
                    out.extend_from_slice(&UTF16_LE_BOM);
                }
                for unit in self.text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            TextEncoding::Utf16Be => {
                out.extend_from_slice(&UTF16_BE_BOM);
                for unit in self.text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
        out
    }

    /// Document text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stored byte encoding
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Declared player count
    pub fn num_players(&self) -> Result<u32> {
        let span = self.scan()?.num_players.ok_or_else(|| {
            Error::settings("no NumPlayers element under the document root")
        })?;
        parse_number(&self.text[span.0..span.1], "NumPlayers")
    }

    /// `Player` elements directly under the root, in document order
    pub fn players(&self) -> Result<Vec<SettingsPlayer>> {
        Ok(self.scan()?.players)
    }

    /// A copy of the document with the player count raised by one and an
    /// observer `Player` element appended to the root.
    ///
    /// Returns the new document and the new player count.
    pub fn with_observer(&self, name: &str, variant: EngineVariant) -> Result<(Self, u32)> {
        let scan = self.scan()?;
        let (start, end) = scan.num_players.ok_or_else(|| {
            Error::settings("no NumPlayers element under the document root")
        })?;
        let root_end = scan
            .root_end
            .ok_or_else(|| Error::settings("document root is not closed"))?;

        let raw = &self.text[start..end];
        let count: u32 = parse_number(raw, "NumPlayers")?;
        let new_count = count
            .checked_add(1)
            .ok_or_else(|| Error::settings(format!("NumPlayers {count} cannot grow")))?;
        let digits_at = start + (raw.len() - raw.trim_start().len());
        let digits_end = start + raw.trim_end().len();

        let element = format!(
            "<Player {}=\"{}\" ControlledPlayer=\"{}\"><Name>{}</Name>\
             <Rating>2800.000000</Rating><Type>{}</Type>\
             <TransformColor1>0</TransformColor1><TransformColor2>0</TransformColor2>\
             <Team>{}</Team><Civilization>1</Civilization><AIPersonality /></Player>",
            variant.player_index_attribute(),
            new_count - 1,
            new_count,
            escape(name),
            OBSERVER_TYPE_CODE,
            OBSERVER_TEAM,
        );

        let mut text = String::with_capacity(self.text.len() + element.len() + 4);
        text.push_str(&self.text[..digits_at]);
        text.push_str(&new_count.to_string());
        text.push_str(&self.text[digits_end..root_end]);
        text.push_str(&element);
        text.push_str(&self.text[root_end..]);

        log::debug!(
            "Settings document: NumPlayers {} -> {}, observer '{}' added",
            count,
            new_count,
            name
        );
        Ok((
            Self {
                text,
                encoding: self.encoding,
            },
            new_count,
        ))
    }

    fn scan(&self) -> Result<Scan> {
        let mut reader = Reader::from_str(&self.text);
        let mut scan = Scan::default();
        let mut depth = 0usize;
        // Element name being read at depth 2 (root children) and depth 3
        // (player children)
        let mut child: Option<Vec<u8>> = None;
        let mut player: Option<SettingsPlayer> = None;

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| {
                Error::settings(format!("XML error at byte {before}: {e}"))
            })?;
            match event {
                Event::Start(e) => {
                    depth += 1;
                    match depth {
                        2 if e.name().as_ref() == b"Player" => {
                            player = Some(player_attributes(&e)?);
                        }
                        2 | 3 => child = Some(e.name().as_ref().to_vec()),
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    if depth == 1 && e.name().as_ref() == b"Player" {
                        scan.players.push(player_attributes(&e)?);
                    }
                }
                Event::Text(e) => {
                    let Some(name) = child.as_deref() else {
                        continue;
                    };
                    match (depth, player.as_mut()) {
                        (2, None) if name == b"NumPlayers" => {
                            // Raw text is the unmodified source slice
                            scan.num_players = Some((before, before + e.len()));
                        }
                        (3, Some(p)) => {
                            let value = e
                                .unescape()
                                .map_err(|e| Error::settings(format!("bad text: {e}")))?;
                            apply_player_child(p, name, &value)?;
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    if depth == 2 {
                        if let Some(done) = player.take() {
                            scan.players.push(done);
                        }
                    }
                    if depth == 1 {
                        let after = reader.buffer_position() as usize;
                        scan.root_end = self.text[..after].rfind("</");
                    }
                    child = None;
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(scan)
    }
}

#[derive(Debug, Default)]
struct Scan {
    num_players: Option<(usize, usize)>,
    root_end: Option<usize>,
    players: Vec<SettingsPlayer>,
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::settings(format!("{what} value '{}' is not a number", raw.trim())))
}

fn player_attributes(element: &BytesStart<'_>) -> Result<SettingsPlayer> {
    let mut player = SettingsPlayer::default();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::settings(format!("bad Player attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::settings(format!("bad Player attribute value: {e}")))?;
        match attr.key.as_ref() {
            b"ClientIndex" | b"ClientID" => {
                player.client_index = Some(parse_number(&value, "Player index")?);
            }
            b"ControlledPlayer" => {
                player.controlled_player = Some(parse_number(&value, "ControlledPlayer")?);
            }
            _ => {}
        }
    }
    Ok(player)
}

fn apply_player_child(player: &mut SettingsPlayer, name: &[u8], value: &str) -> Result<()> {
    match name {
        b"Name" => player.name = Some(value.to_string()),
        b"Type" => player.player_type = Some(parse_number(value, "Type")?),
        b"Team" => player.team = Some(parse_number(value, "Team")?),
        b"Civilization" => player.civilization = Some(parse_number(value, "Civilization")?),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    const TWO_PLAYERS: &str = "<GameSettings><Filename>alfheim</Filename>\
        <NumPlayers>2</NumPlayers>\
        <Player ClientIndex=\"0\" ControlledPlayer=\"1\"><Name>Arkantos</Name>\
        <Type>0</Type><Team>0</Team><Civilization>1</Civilization></Player>\
        <Player ClientIndex=\"1\" ControlledPlayer=\"2\"><Name>Gargarensis</Name>\
        <Type>0</Type><Team>1</Team><Civilization>6</Civilization></Player>\
        </GameSettings>";

    #[test]
    fn test_utf16_round_trip_keeps_bom() {
        let doc = SettingsDocument::from_text(TWO_PLAYERS);
        let bytes = doc.encode();
        assert_eq!(&bytes[..2], &UTF16_LE_BOM);

        let decoded = SettingsDocument::decode(&bytes).unwrap();
        assert_eq!(decoded.text(), TWO_PLAYERS);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_big_endian_and_bomless_input() {
        let mut be = UTF16_BE_BOM.to_vec();
        for unit in "<a/>".encode_utf16() {
            be.extend_from_slice(&unit.to_be_bytes());
        }
        let doc = SettingsDocument::decode(&be).unwrap();
        assert_eq!(doc.text(), "<a/>");
        assert_eq!(doc.encode(), be);

        let bare: Vec<u8> = "<a/>".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let doc = SettingsDocument::decode(&bare).unwrap();
        assert_eq!(doc.encoding(), TextEncoding::Utf16Le { bom: false });
        assert_eq!(doc.encode(), bare);
    }

    #[test]
    fn test_odd_length_is_rejected() {
        let err = SettingsDocument::decode(&[0xff, 0xfe, 0x3c]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_players_and_count() {
        let doc = SettingsDocument::from_text(TWO_PLAYERS);
        assert_eq!(doc.num_players().unwrap(), 2);

        let players = doc.players().unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].client_index, Some(0));
        assert_eq!(players[1].name.as_deref(), Some("Gargarensis"));
        assert_eq!(players[1].team, Some(1));
        assert_eq!(players[1].civilization, Some(6));
        assert!(!players[0].is_observer());
    }

    #[test]
    fn test_with_observer_splices_only_two_ranges() {
        let doc = SettingsDocument::from_text(TWO_PLAYERS);
        let (updated, count) = doc.with_observer("Stu", EngineVariant::Extended).unwrap();
        assert_eq!(count, 3);
        assert_eq!(updated.num_players().unwrap(), 3);

        let expected = TWO_PLAYERS
            .replace("<NumPlayers>2<", "<NumPlayers>3<")
            .replace(
                "</GameSettings>",
                "<Player ClientIndex=\"2\" ControlledPlayer=\"3\"><Name>Stu</Name>\
                 <Rating>2800.000000</Rating><Type>4</Type>\
                 <TransformColor1>0</TransformColor1><TransformColor2>0</TransformColor2>\
                 <Team>255</Team><Civilization>1</Civilization><AIPersonality /></Player>\
                 </GameSettings>",
            );
        assert_eq!(updated.text(), expected);

        let observer = updated.players().unwrap().pop().unwrap();
        assert!(observer.is_observer());
        assert_eq!(observer.name.as_deref(), Some("Stu"));
        assert_eq!(observer.team, Some(OBSERVER_TEAM));
    }

    #[test]
    fn test_with_observer_legacy_attribute_and_escaping() {
        let doc = SettingsDocument::from_text(
            "<Settings>\n  <NumPlayers> 1 </NumPlayers>\n</Settings>\n",
        );
        let (updated, count) = doc.with_observer("A&B", EngineVariant::Legacy).unwrap();
        assert_eq!(count, 2);
        assert!(updated.text().contains("<NumPlayers> 2 </NumPlayers>"));
        assert!(updated.text().contains("<Player ClientID=\"1\" ControlledPlayer=\"2\">"));
        assert!(updated.text().contains("<Name>A&amp;B</Name>"));
        assert!(updated.text().ends_with("</Player></Settings>\n"));

        let players = updated.players().unwrap();
        assert_eq!(players[0].name.as_deref(), Some("A&B"));
    }

    #[test]
    fn test_missing_player_count() {
        let doc = SettingsDocument::from_text("<GameSettings></GameSettings>");
        assert_eq!(doc.num_players().unwrap_err().kind(), ErrorKind::Format);
        assert!(doc.with_observer("x", EngineVariant::Extended).is_err());
    }

    #[test]
    fn test_saturated_player_count() {
        let doc = SettingsDocument::from_text(
            "<GameSettings><NumPlayers>4294967295</NumPlayers></GameSettings>",
        );
        assert_eq!(doc.num_players().unwrap(), u32::MAX);
        let err = doc
            .with_observer("Stu", EngineVariant::Extended)
            .unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }

    #[test]
    fn test_malformed_xml() {
        let doc = SettingsDocument::from_text("<GameSettings><NumPlayers>2</Oops></GameSettings>");
        assert!(doc.num_players().is_err());
    }
}

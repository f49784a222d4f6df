//! Per-tick update records.
//!
//! ```text
//! u8                  load flags
//! [u32 x3]            camera words, one per CAMERA1..CAMERA3 bit
//! [12 bytes x3]       camera vectors when CAMERA_VECTORS is set
//! u8 | u32            elapsed time (u8 when TIME is set)
//! [u8 count]          command count when FEW_COMMANDS is set
//! command slots
//! [u8 count, u32 ids] selected units when SELECTED_UNITS is set
//! u8 count, u8 ids    affected players
//! [u8 marker]         sync marker, gated by SyncGate
//! [sync block]        when the marker is non-zero
//! ```
//!
//! The same step functions drive plain decoding and the mutator's echoing
//! pass, so both agree on where every field starts and ends.

use crate::commands::{Command, Vector3, WireField, read_command_slot, write_command_slot};
use crate::cursor::{ByteWriter, WireRead};
use crate::error::{Error, Result, Unsupported};
use crate::options::{EngineVariant, ParseOptions, SyncGate};
use bitflags::bitflags;

bitflags! {
    /// Flags byte at the start of every tick
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u8 {
        /// Elapsed time fits in one byte
        const TIME = 0x01;
        /// First camera word present
        const CAMERA1 = 0x02;
        /// Second camera word present
        const CAMERA2 = 0x04;
        /// Third camera word present
        const CAMERA3 = 0x08;
        /// Three camera vectors present
        const CAMERA_VECTORS = 0x10;
        /// One-byte command count present
        const FEW_COMMANDS = 0x20;
        /// Four-byte command count present
        const MANY_COMMANDS = 0x40;
        /// Selected unit list present
        const SELECTED_UNITS = 0x80;
    }
}

/// Optional camera state carried by a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraFields {
    /// Word gated by [`LoadFlags::CAMERA1`]
    pub first: Option<u32>,
    /// Word gated by [`LoadFlags::CAMERA2`]
    pub second: Option<u32>,
    /// Word gated by [`LoadFlags::CAMERA3`]
    pub third: Option<u32>,
    /// Vectors gated by [`LoadFlags::CAMERA_VECTORS`]
    pub vectors: Option<[Vector3; 3]>,
}

impl CameraFields {
    /// Load flags implied by the fields that are present
    pub fn flags(&self) -> LoadFlags {
        let mut flags = LoadFlags::empty();
        flags.set(LoadFlags::CAMERA1, self.first.is_some());
        flags.set(LoadFlags::CAMERA2, self.second.is_some());
        flags.set(LoadFlags::CAMERA3, self.third.is_some());
        flags.set(LoadFlags::CAMERA_VECTORS, self.vectors.is_some());
        flags
    }
}

/// One checksum entry of a sync block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncEntry {
    /// Entry kind; the low nibble decides whether `extra` is present
    pub kind: u8,
    /// Unidentified byte
    pub unknown_1: u8,
    /// Unidentified half-word
    pub unknown_2: u16,
    /// Word present unless the kind's low nibble is 5
    pub extra: Option<u32>,
    /// First checksum word
    pub value_1: u32,
    /// Second checksum word
    pub value_2: u32,
}

impl SyncEntry {
    /// Low nibble value of kinds that carry no `extra` word
    pub const SHORT_KIND: u8 = 5;

    /// Whether entries of this kind carry the `extra` word
    pub fn kind_has_extra(kind: u8) -> bool {
        kind & 0x0f != Self::SHORT_KIND
    }
}

/// Per-tick desync detection data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncBlock {
    /// Checksum entries
    pub entries: Vec<SyncEntry>,
    /// Trailing plain words
    pub values: Vec<u32>,
}

impl SyncBlock {
    /// Decode a sync block
    pub fn read<R: WireRead>(reader: &mut R) -> Result<Self> {
        let count = reader.read_count(12)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = reader.read_u8()?;
            let unknown_1 = reader.read_u8()?;
            let unknown_2 = reader.read_u16()?;
            let extra = if SyncEntry::kind_has_extra(kind) {
                Some(reader.read_u32()?)
            } else {
                None
            };
            entries.push(SyncEntry {
                kind,
                unknown_1,
                unknown_2,
                extra,
                value_1: reader.read_u32()?,
                value_2: reader.read_u32()?,
            });
        }

        let count = reader.read_count(4)?;
        let values = (0..count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries, values })
    }

    /// Encode the sync block
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_count(self.entries.len(), "sync entry")?;
        for entry in &self.entries {
            writer.write_u8(entry.kind);
            writer.write_u8(entry.unknown_1);
            writer.write_u16(entry.unknown_2);
            match (SyncEntry::kind_has_extra(entry.kind), entry.extra) {
                (true, Some(extra)) => writer.write_u32(extra),
                (false, None) => {}
                (expected, _) => {
                    return Err(Error::encode(format!(
                        "sync entry kind 0x{:02x} {} an extra word",
                        entry.kind,
                        if expected { "requires" } else { "cannot carry" }
                    )));
                }
            }
            writer.write_u32(entry.value_1);
            writer.write_u32(entry.value_2);
        }
        writer.write_count(self.values.len(), "sync value")?;
        for value in &self.values {
            writer.write_u32(*value);
        }
        Ok(())
    }
}

/// One decoded tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Raw load flags
    pub flags: LoadFlags,
    /// Camera state
    pub camera: CameraFields,
    /// Milliseconds since the previous tick
    pub elapsed_ms: u32,
    /// Command slots; `None` for slots with a zero presence byte
    pub commands: Vec<Option<Command>>,
    /// Selected unit ids
    pub selected_units: Vec<u32>,
    /// Affected player ids
    pub affected_players: Vec<u8>,
    /// Sync marker byte, when the tick carries one
    pub sync_marker: Option<u8>,
    /// Sync block following a non-zero marker
    pub sync: Option<SyncBlock>,
}

impl Update {
    /// An empty tick lasting `elapsed_ms`, with an unset sync marker
    pub fn new(elapsed_ms: u32) -> Self {
        let mut flags = LoadFlags::empty();
        flags.set(LoadFlags::TIME, elapsed_ms <= u8::MAX as u32);
        Self {
            flags,
            elapsed_ms,
            sync_marker: Some(0),
            ..Self::default()
        }
    }

    /// Append a command, switching on the one-byte command count
    pub fn with_command(mut self, command: impl Into<Command>) -> Self {
        self.flags.insert(LoadFlags::FEW_COMMANDS);
        self.commands.push(Some(command.into()));
        self
    }

    /// Attach a selected unit list
    pub fn with_selected_units(mut self, units: Vec<u32>) -> Self {
        self.flags.insert(LoadFlags::SELECTED_UNITS);
        self.selected_units = units;
        self
    }

    /// Attach an affected player list
    pub fn with_affected_players(mut self, players: Vec<u8>) -> Self {
        self.affected_players = players;
        self
    }

    /// Attach camera state
    pub fn with_camera(mut self, camera: CameraFields) -> Self {
        self.flags.remove(camera_mask());
        self.flags.insert(camera.flags());
        self.camera = camera;
        self
    }

    /// Attach a sync block behind a marker of 1
    pub fn with_sync(mut self, block: SyncBlock) -> Self {
        self.sync_marker = Some(1);
        self.sync = Some(block);
        self
    }

    /// Present commands, skipping empty slots
    pub fn present_commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().flatten()
    }

    /// Encode the tick. Flags are written as stored and decide which fields
    /// are emitted; fields that disagree with them are rejected.
    pub fn write(&self, writer: &mut ByteWriter, options: &ParseOptions) -> Result<()> {
        let flags = self.flags;
        if flags.contains(LoadFlags::MANY_COMMANDS) {
            return Err(Error::unsupported(
                writer.len(),
                Unsupported::ManyCommands { flags: flags.bits() },
            ));
        }
        if self.camera.flags() != flags & camera_mask() {
            return Err(Error::encode(format!(
                "camera fields do not match load flags 0x{:02x}",
                flags.bits()
            )));
        }
        writer.write_u8(flags.bits());

        write_camera(writer, &self.camera)?;

        if flags.contains(LoadFlags::TIME) {
            let elapsed = u8::try_from(self.elapsed_ms).map_err(|_| {
                Error::encode(format!("{} ms in a one-byte time field", self.elapsed_ms))
            })?;
            writer.write_u8(elapsed);
        } else {
            writer.write_u32(self.elapsed_ms);
        }

        if flags.contains(LoadFlags::FEW_COMMANDS) {
            writer.write_u8(small_count(self.commands.len(), "command")?);
        } else if !self.commands.is_empty() {
            return Err(Error::encode(format!(
                "{} commands without a command count flag",
                self.commands.len()
            )));
        }
        for slot in &self.commands {
            write_command_slot(writer, slot.as_ref())?;
        }

        if flags.contains(LoadFlags::SELECTED_UNITS) {
            writer.write_u8(small_count(self.selected_units.len(), "selected unit")?);
            for unit in &self.selected_units {
                writer.write_u32(*unit);
            }
        } else if !self.selected_units.is_empty() {
            return Err(Error::encode(
                "selected units without the selected units flag".to_string(),
            ));
        }

        writer.write_u8(small_count(self.affected_players.len(), "affected player")?);
        writer.write_bytes(&self.affected_players);

        if sync_marker_present(options, flags.bits(), writer.len())? {
            let marker = self.sync_marker.unwrap_or(u8::from(self.sync.is_some()));
            writer.write_u8(marker);
            if marker != 0 {
                self.sync
                    .as_ref()
                    .ok_or_else(|| Error::encode("non-zero sync marker without a sync block"))?
                    .write(writer)?;
            }
        }
        Ok(())
    }
}

fn camera_mask() -> LoadFlags {
    LoadFlags::CAMERA1 | LoadFlags::CAMERA2 | LoadFlags::CAMERA3 | LoadFlags::CAMERA_VECTORS
}

fn small_count(len: usize, what: &str) -> Result<u8> {
    u8::try_from(len).map_err(|_| Error::encode(format!("{len} {what}s in a one-byte count")))
}

fn write_camera(writer: &mut ByteWriter, camera: &CameraFields) -> Result<()> {
    for word in [camera.first, camera.second, camera.third].into_iter().flatten() {
        writer.write_u32(word);
    }
    if let Some(vectors) = &camera.vectors {
        for vector in vectors {
            vector.write_to(writer)?;
        }
    }
    Ok(())
}

/// Whether the sync marker byte follows the affected player list
fn sync_marker_present(options: &ParseOptions, flags: u8, offset: usize) -> Result<bool> {
    match options.variant {
        EngineVariant::Extended => Ok(options.sync_gate.expects_marker(flags)),
        EngineVariant::Legacy if options.sync_gate.version >= 2 => Ok(false),
        EngineVariant::Legacy => Err(Error::unsupported(
            offset,
            Unsupported::LegacySyncBlock {
                version: options.sync_gate.version,
            },
        )),
    }
}

/// Step-wise tick decoder.
///
/// [`TickDecoder::read_update`] runs every step in order. The individual
/// steps are public so a caller can interleave its own reads and writes
/// between them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickDecoder {
    options: ParseOptions,
}

impl TickDecoder {
    /// Create a decoder for the given options
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Options this decoder was created with
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Decode one complete tick
    pub fn read_update<R: WireRead>(&self, reader: &mut R) -> Result<Update> {
        let flags = self.read_flags(reader)?;
        let camera = self.read_camera(reader, flags)?;
        let elapsed_ms = self.read_elapsed(reader, flags)?;

        let count = self.read_command_count(reader, flags)?;
        let mut commands = Vec::with_capacity(count);
        for _ in 0..count {
            commands.push(read_command_slot(reader)?);
        }

        let selected_units = self.read_selected_units(reader, flags)?;
        let affected_players = self.read_affected_players(reader)?;
        let (sync_marker, sync) = self.read_sync(reader, flags)?;

        Ok(Update {
            flags,
            camera,
            elapsed_ms,
            commands,
            selected_units,
            affected_players,
            sync_marker,
            sync,
        })
    }

    /// Read the flags byte, rejecting the four-byte command count encoding
    pub fn read_flags<R: WireRead>(&self, reader: &mut R) -> Result<LoadFlags> {
        let offset = reader.position();
        let flags = LoadFlags::from_bits_retain(reader.read_u8()?);
        if flags.contains(LoadFlags::MANY_COMMANDS) {
            return Err(Error::unsupported(
                offset,
                Unsupported::ManyCommands { flags: flags.bits() },
            ));
        }
        Ok(flags)
    }

    /// Read the camera words and vectors selected by `flags`
    pub fn read_camera<R: WireRead>(&self, reader: &mut R, flags: LoadFlags) -> Result<CameraFields> {
        let mut word = |bit: LoadFlags| -> Result<Option<u32>> {
            if flags.contains(bit) {
                Ok(Some(reader.read_u32()?))
            } else {
                Ok(None)
            }
        };
        let first = word(LoadFlags::CAMERA1)?;
        let second = word(LoadFlags::CAMERA2)?;
        let third = word(LoadFlags::CAMERA3)?;

        let vectors = if flags.contains(LoadFlags::CAMERA_VECTORS) {
            Some([
                Vector3::read_from(reader)?,
                Vector3::read_from(reader)?,
                Vector3::read_from(reader)?,
            ])
        } else {
            None
        };
        Ok(CameraFields {
            first,
            second,
            third,
            vectors,
        })
    }

    /// Read the elapsed time field
    pub fn read_elapsed<R: WireRead>(&self, reader: &mut R, flags: LoadFlags) -> Result<u32> {
        if flags.contains(LoadFlags::TIME) {
            Ok(u32::from(reader.read_u8()?))
        } else {
            reader.read_u32()
        }
    }

    /// Read the command count; zero when no count flag is set
    pub fn read_command_count<R: WireRead>(&self, reader: &mut R, flags: LoadFlags) -> Result<usize> {
        if flags.contains(LoadFlags::FEW_COMMANDS) {
            Ok(usize::from(reader.read_u8()?))
        } else if flags.contains(LoadFlags::MANY_COMMANDS) {
            Err(Error::unsupported(
                reader.position(),
                Unsupported::ManyCommands { flags: flags.bits() },
            ))
        } else {
            Ok(0)
        }
    }

    /// Read the selected unit list when `flags` announce one
    pub fn read_selected_units<R: WireRead>(
        &self,
        reader: &mut R,
        flags: LoadFlags,
    ) -> Result<Vec<u32>> {
        if !flags.contains(LoadFlags::SELECTED_UNITS) {
            return Ok(Vec::new());
        }
        let count = reader.read_u8()?;
        (0..count).map(|_| reader.read_u32()).collect()
    }

    /// Read the affected player list
    pub fn read_affected_players<R: WireRead>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let count = usize::from(reader.read_u8()?);
        reader.read_bytes(count)
    }

    /// Read the sync marker and block, if the gate says the tick has them
    pub fn read_sync<R: WireRead>(
        &self,
        reader: &mut R,
        flags: LoadFlags,
    ) -> Result<(Option<u8>, Option<SyncBlock>)> {
        if !sync_marker_present(&self.options, flags.bits(), reader.position())? {
            return Ok((None, None));
        }
        let marker = reader.read_u8()?;
        if marker == 0 {
            return Ok((Some(0), None));
        }
        Ok((Some(marker), Some(SyncBlock::read(reader)?)))
    }

    /// The sync gate in effect
    pub fn sync_gate(&self) -> SyncGate {
        self.options.sync_gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommonHeader, ResearchCommand};
    use crate::cursor::ByteReader;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn encode(update: &Update) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        update.write(&mut writer, &ParseOptions::default()).unwrap();
        writer.into_inner()
    }

    fn decode(bytes: &[u8]) -> (Update, usize) {
        let mut reader = ByteReader::new(bytes);
        let update = TickDecoder::default().read_update(&mut reader).unwrap();
        (update, reader.position())
    }

    #[test]
    fn test_idle_tick_layout() {
        let bytes = encode(&Update::new(50));
        // flags, one-byte time, affected count, sync marker
        assert_eq!(bytes, vec![0x01, 50, 0, 0]);
    }

    #[test]
    fn test_long_tick_uses_four_byte_time() {
        let bytes = encode(&Update::new(1000));
        assert_eq!(bytes[0], 0x00);
        assert_eq!(&bytes[1..5], &1000u32.to_le_bytes());
        assert_eq!(decode(&bytes).0.elapsed_ms, 1000);
    }

    #[test]
    fn test_full_tick_round_trip() {
        let update = Update::new(33)
            .with_camera(CameraFields {
                first: Some(1),
                second: None,
                third: Some(3),
                vectors: Some([Vector3::new(1, 2, 3); 3]),
            })
            .with_command(ResearchCommand {
                header: CommonHeader {
                    player: 2,
                    ..CommonHeader::default()
                },
                tech_id: 5,
                unknown_b0: 0,
            })
            .with_selected_units(vec![400, 401])
            .with_affected_players(vec![1, 2])
            .with_sync(SyncBlock {
                entries: vec![
                    SyncEntry {
                        kind: 0x15,
                        unknown_1: 1,
                        unknown_2: 0x0203,
                        extra: None,
                        value_1: 10,
                        value_2: 11,
                    },
                    SyncEntry {
                        kind: 0x02,
                        unknown_1: 0,
                        unknown_2: 0,
                        extra: Some(0xabcd),
                        value_1: 12,
                        value_2: 13,
                    },
                ],
                values: vec![7, 8, 9],
            });

        let mut bytes = encode(&update);
        bytes.push(0x5a);
        let (decoded, consumed) = decode(&bytes);
        assert_eq!(decoded, update);
        assert_eq!(consumed, bytes.len() - 1);
    }

    #[test]
    fn test_empty_command_slot() {
        let mut update = Update::new(10);
        update.flags.insert(LoadFlags::FEW_COMMANDS);
        update.commands.push(None);

        let bytes = encode(&update);
        assert_eq!(bytes, vec![0x21, 10, 1, 0, 0, 0]);
        assert_eq!(decode(&bytes).0.commands, vec![None]);
    }

    #[test]
    fn test_many_commands_flag_is_unsupported() {
        let err = TickDecoder::default()
            .read_update(&mut ByteReader::new(&[0x40, 0, 0, 0, 0]))
            .unwrap_err();
        assert_eq!(
            err.unsupported_feature(),
            Some(&Unsupported::ManyCommands { flags: 0x40 })
        );
    }

    #[test]
    fn test_short_sync_entry_has_no_extra_word() {
        let mut writer = ByteWriter::new();
        SyncBlock {
            entries: vec![SyncEntry {
                kind: 0x25,
                ..SyncEntry::default()
            }],
            values: Vec::new(),
        }
        .write(&mut writer)
        .unwrap();
        // count, kind, byte, half-word, two words, value count
        assert_eq!(writer.len(), 4 + 1 + 1 + 2 + 8 + 4);
    }

    #[test]
    fn test_mismatched_sync_entry_is_rejected() {
        let block = SyncBlock {
            entries: vec![SyncEntry {
                kind: 0x05,
                extra: Some(1),
                ..SyncEntry::default()
            }],
            values: Vec::new(),
        };
        let err = block.write(&mut ByteWriter::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn test_legacy_gate() {
        let legacy = ParseOptions::for_variant(EngineVariant::Legacy);
        let mut writer = ByteWriter::new();
        Update::new(5).write(&mut writer, &legacy).unwrap();
        let bytes = writer.into_inner();
        // No sync marker for legacy builds
        assert_eq!(bytes, vec![0x01, 5, 0]);

        let decoder = TickDecoder::new(legacy);
        let update = decoder.read_update(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(update.sync_marker, None);

        let old = TickDecoder::new(ParseOptions {
            variant: EngineVariant::Legacy,
            sync_gate: SyncGate {
                version: 1,
                enabled: true,
            },
        });
        let err = old.read_update(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(
            err.unsupported_feature(),
            Some(&Unsupported::LegacySyncBlock { version: 1 })
        );
    }

    #[test]
    fn test_time_overflow_is_encode_error() {
        let mut update = Update::new(10);
        update.elapsed_ms = 300;
        let err = update
            .write(&mut ByteWriter::new(), &ParseOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }
}

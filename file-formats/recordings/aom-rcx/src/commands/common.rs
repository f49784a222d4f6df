//! Fields shared by every command and the primitive field codecs the
//! command table is built from.

use crate::cursor::{ByteWriter, WireRead};
use crate::error::Result;

/// Three raw 32-bit words. Used for positions, headings and waypoints;
/// the words are kept as stored rather than reinterpreted as floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Vector3 {
    /// First word
    pub x: u32,
    /// Second word
    pub y: u32,
    /// Third word
    pub z: u32,
}

impl Vector3 {
    /// Encoded size in bytes
    pub const SIZE: usize = 12;

    /// Create a vector from its three words
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Length-prefixed name carried by unit creation commands.
///
/// Wire layout: `u32 length`, `u32 block`, `length` bytes. The block word is
/// preserved without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameBlob {
    /// Word stored between the length and the name bytes
    pub block: u32,
    /// Raw name bytes
    pub bytes: Vec<u8>,
}

impl NameBlob {
    /// The name decoded as UTF-8, replacing invalid sequences
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A value with a fixed wire encoding inside a command record
pub trait WireField: Sized {
    /// Decode one value
    fn read_from<R: WireRead>(reader: &mut R) -> Result<Self>;

    /// Encode one value
    fn write_to(&self, writer: &mut ByteWriter) -> Result<()>;
}

impl WireField for u8 {
    fn read_from<R: WireRead>(reader: &mut R) -> Result<Self> {
        reader.read_u8()
    }

    fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u8(*self);
        Ok(())
    }
}

impl WireField for u32 {
    fn read_from<R: WireRead>(reader: &mut R) -> Result<Self> {
        reader.read_u32()
    }

    fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u32(*self);
        Ok(())
    }
}

impl WireField for i32 {
    fn read_from<R: WireRead>(reader: &mut R) -> Result<Self> {
        reader.read_i32()
    }

    fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_i32(*self);
        Ok(())
    }
}

impl WireField for Vector3 {
    fn read_from<R: WireRead>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            x: reader.read_u32()?,
            y: reader.read_u32()?,
            z: reader.read_u32()?,
        })
    }

    fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u32(self.x);
        writer.write_u32(self.y);
        writer.write_u32(self.z);
        Ok(())
    }
}

impl WireField for NameBlob {
    fn read_from<R: WireRead>(reader: &mut R) -> Result<Self> {
        let len = reader.read_count(1)?;
        let block = reader.read_u32()?;
        let bytes = reader.read_bytes(len)?;
        Ok(Self { block, bytes })
    }

    fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_count(self.bytes.len(), "unit name byte")?;
        writer.write_u32(self.block);
        writer.write_bytes(&self.bytes);
        Ok(())
    }
}

/// Header embedded at the start of every command record.
///
/// Fields named `unknown_*` carry the approximate engine structure offset
/// they were found at; their meaning is not known and they are preserved
/// as read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonHeader {
    /// Per-command sequence byte
    pub sequence: u8,
    /// Issuing player
    pub player: i32,
    /// Unidentified word
    pub unknown_28: u32,
    /// Issuing AI, -1 for human input
    pub ai: i32,
    /// Unidentified word
    pub unknown_30: u32,
    /// Unidentified list, usually holding the issuing player
    pub unknown_34: Vec<u32>,
    /// Unidentified word
    pub unknown_48: u32,
    /// Entity ids the command applies to
    pub recipients: Vec<u32>,
    /// Waypoint vectors
    pub waypoints: Vec<Vector3>,
    /// Opaque flag bytes
    pub flag_bytes: Vec<u8>,
    /// Unidentified word
    pub unknown_8c: u32,
    /// Unidentified word
    pub unknown_90: u32,
    /// Unidentified word
    pub unknown_94: u32,
    /// Urgency counter
    pub urgency: u8,
    /// Event id, -1 when unset
    pub event: i32,
    /// Plan id, -1 when unset
    pub plan: i32,
}

impl CommonHeader {
    /// Decode a header
    pub fn read<R: WireRead>(reader: &mut R) -> Result<Self> {
        let sequence = reader.read_u8()?;
        let player = reader.read_i32()?;
        let unknown_28 = reader.read_u32()?;
        let ai = reader.read_i32()?;
        let unknown_30 = reader.read_u32()?;

        let count = reader.read_count(4)?;
        let unknown_34 = (0..count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;

        let unknown_48 = reader.read_u32()?;

        let count = reader.read_count(4)?;
        let recipients = (0..count)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>>>()?;

        let count = reader.read_count(Vector3::SIZE)?;
        let waypoints = (0..count)
            .map(|_| Vector3::read_from(reader))
            .collect::<Result<Vec<_>>>()?;

        let len = reader.read_count(1)?;
        let flag_bytes = reader.read_bytes(len)?;

        Ok(Self {
            sequence,
            player,
            unknown_28,
            ai,
            unknown_30,
            unknown_34,
            unknown_48,
            recipients,
            waypoints,
            flag_bytes,
            unknown_8c: reader.read_u32()?,
            unknown_90: reader.read_u32()?,
            unknown_94: reader.read_u32()?,
            urgency: reader.read_u8()?,
            event: reader.read_i32()?,
            plan: reader.read_i32()?,
        })
    }

    /// Encode the header
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u8(self.sequence);
        writer.write_i32(self.player);
        writer.write_u32(self.unknown_28);
        writer.write_i32(self.ai);
        writer.write_u32(self.unknown_30);

        writer.write_count(self.unknown_34.len(), "header list")?;
        for value in &self.unknown_34 {
            writer.write_u32(*value);
        }

        writer.write_u32(self.unknown_48);

        writer.write_count(self.recipients.len(), "recipient")?;
        for id in &self.recipients {
            writer.write_u32(*id);
        }

        writer.write_count(self.waypoints.len(), "waypoint")?;
        for waypoint in &self.waypoints {
            waypoint.write_to(writer)?;
        }

        writer.write_count(self.flag_bytes.len(), "flag byte")?;
        writer.write_bytes(&self.flag_bytes);

        writer.write_u32(self.unknown_8c);
        writer.write_u32(self.unknown_90);
        writer.write_u32(self.unknown_94);
        writer.write_u8(self.urgency);
        writer.write_i32(self.event);
        writer.write_i32(self.plan);
        Ok(())
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        // sequence, player, 28, ai, 30, list count, 48, recipient count,
        // waypoint count, flag length, 8c, 90, 94, urgency, event, plan
        const FIXED: usize = 1 + 4 * 4 + 4 + 4 + 4 + 4 + 4 + 3 * 4 + 1 + 4 + 4;
        FIXED
            + self.unknown_34.len() * 4
            + self.recipients.len() * 4
            + self.waypoints.len() * Vector3::SIZE
            + self.flag_bytes.len()
    }
}

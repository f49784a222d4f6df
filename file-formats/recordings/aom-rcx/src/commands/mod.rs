//! Command registry: opcode dispatch and the per-opcode record layouts.
//!
//! Every command record on the wire is a presence byte, then (when present)
//! a `u32` opcode followed by a [`CommonHeader`] and the opcode's own
//! fields. The record length is only known once the record is decoded, so an
//! opcode without a layout stops decoding with
//! [`Error::UnsupportedFeature`](crate::Error::UnsupportedFeature).

mod common;

pub use common::{CommonHeader, NameBlob, Vector3, WireField};

use crate::cursor::{ByteWriter, WireRead};
use crate::error::{Error, Result, Unsupported};

/// Opcodes the engine defines whose record layout has not been recovered
pub const UNRECOVERED_OPCODES: &[(u32, &str)] = &[(0x09, "AddResource"), (0x0f, "Pause")];

/// Generate the command structs, the [`CommandKind`] and [`Command`] enums
/// and the opcode dispatch from one table.
///
/// Each entry reads `opcode => Variant(Struct) [prefix fields] { fields }`.
/// Prefix fields sit before the common header on the wire.
macro_rules! command_layouts {
    ($(
        $(#[$meta:meta])*
        $opcode:literal => $variant:ident($name:ident)
        $([ $($(#[$pmeta:meta])* $pfield:ident : $pty:ty),* $(,)? ])?
        { $($(#[$fmeta:meta])* $field:ident : $fty:ty),* $(,)? }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Default, PartialEq, Eq)]
            pub struct $name {
                $($($(#[$pmeta])* pub $pfield: $pty,)*)?
                /// Fields shared by every command
                pub header: CommonHeader,
                $($(#[$fmeta])* pub $field: $fty,)*
            }

            impl $name {
                /// Wire opcode
                pub const OPCODE: u32 = $opcode;

                fn read_body<R: WireRead>(reader: &mut R) -> Result<Self> {
                    $($(let $pfield = <$pty as WireField>::read_from(reader)?;)*)?
                    let header = CommonHeader::read(reader)?;
                    $(let $field = <$fty as WireField>::read_from(reader)?;)*
                    Ok(Self {
                        $($($pfield,)*)?
                        header,
                        $($field,)*
                    })
                }

                fn write_body(&self, writer: &mut ByteWriter) -> Result<()> {
                    $($(self.$pfield.write_to(writer)?;)*)?
                    self.header.write(writer)?;
                    $(self.$field.write_to(writer)?;)*
                    Ok(())
                }
            }

            impl From<$name> for Command {
                fn from(command: $name) -> Self {
                    Command::$variant(command)
                }
            }
        )*

        /// Discriminant of every command with a recovered layout
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl CommandKind {
            /// Every kind, in opcode order
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$variant,)*];

            /// Look up the kind for a wire opcode
            pub fn from_opcode(opcode: u32) -> Option<Self> {
                match opcode {
                    $($opcode => Some(CommandKind::$variant),)*
                    _ => None,
                }
            }

            /// Wire opcode
            pub fn opcode(self) -> u32 {
                match self {
                    $(CommandKind::$variant => $opcode,)*
                }
            }

            /// Engine name of the command
            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$variant => stringify!($variant),)*
                }
            }
        }

        /// A decoded command record
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Command {
            $(
                #[allow(missing_docs)]
                $variant($name),
            )*
        }

        impl Command {
            /// Discriminant of this command
            pub fn kind(&self) -> CommandKind {
                match self {
                    $(Command::$variant(_) => CommandKind::$variant,)*
                }
            }

            /// The shared header
            pub fn header(&self) -> &CommonHeader {
                match self {
                    $(Command::$variant(c) => &c.header,)*
                }
            }

            /// Mutable access to the shared header
            pub fn header_mut(&mut self) -> &mut CommonHeader {
                match self {
                    $(Command::$variant(c) => &mut c.header,)*
                }
            }

            fn write_body(&self, writer: &mut ByteWriter) -> Result<()> {
                match self {
                    $(Command::$variant(c) => c.write_body(writer),)*
                }
            }
        }

        /// Decode the record body for `opcode`, starting right after the
        /// opcode word
        pub fn decode_command<R: WireRead>(opcode: u32, reader: &mut R) -> Result<Command> {
            match opcode {
                $($opcode => $name::read_body(reader).map(Command::$variant),)*
                _ => Err(Error::unsupported(reader.position(), unsupported_opcode(opcode))),
            }
        }
    };
}

command_layouts! {
    /// Units work on a target entity
    0x00 => Work(WorkCommand) {
        /// Target unit
        unit_id: u32,
        /// Work range
        range: u32,
        /// Terrain point the work is aimed at
        terrain_point: Vector3,
    }

    /// Queue a technology
    0x01 => Research(ResearchCommand) {
        /// Technology id
        tech_id: u32,
        /// Unidentified trailing word
        unknown_b0: u32,
    }

    /// Train units from a building
    0x02 => Train(TrainCommand) {
        /// Prototype unit to train
        proto_unit_id: u32,
        /// Action word
        action: u32,
        /// Army the trained units join
        army_id: u32,
    }

    /// Place a building
    0x03 => Build(BuildCommand) {
        /// Building prototype
        proto_unit_id: u32,
        /// Placement position
        position: Vector3,
        /// Second placement vector
        facing: Vector3,
        /// Resource id
        resource_id: u32,
        /// Unidentified trailing word
        unknown_cc: u32,
    }

    /// Move a gather point
    0x04 => SetGatherPoint(SetGatherPointCommand) {
        #[allow(missing_docs)]
        unknown_1: u32,
        #[allow(missing_docs)]
        unknown_2: u32,
        #[allow(missing_docs)]
        unknown_3: u32,
        #[allow(missing_docs)]
        unknown_4: u32,
        #[allow(missing_docs)]
        unknown_5: u32,
    }

    /// Spawn a unit by prototype
    0x06 => CreateUnit(CreateUnitCommand) {
        /// Prototype unit id
        proto_unit_id: u32,
        /// Heading vector
        heading: Vector3,
        /// Spawn position
        position: Vector3,
        /// Unit name
        name: NameBlob,
    }

    /// Delete selected units
    0x07 => DeleteUnit(DeleteUnitCommand) {
        /// Unidentified byte
        unknown_1: u8,
    }

    /// Stop current orders
    0x0a => Stop(StopCommand) {}

    /// Cast a god power
    0x10 => SpecialPower(SpecialPowerCommand) {
        /// Power id
        power_id: u32,
        /// First target vector
        target: Vector3,
        /// Second target vector
        secondary_target: Vector3,
        /// Unidentified trailing word
        unknown_4: u32,
    }

    /// Buy or sell at the market
    0x11 => Market(MarketCommand) {
        /// Resource traded
        resource: u32,
        /// Unidentified word
        unknown_b0: u32,
        /// Amount traded
        amount: u32,
    }

    /// Eject garrisoned units
    0x12 => Eject(EjectCommand) {
        /// Unidentified word
        unknown_1: u32,
    }

    /// Player resignation
    0x14 => Resign(ResignCommand) {
        /// Field the engine stores alongside the resigning player; the
        /// observer id when synthesized by the mutator
        resigning_player: u32,
        /// Unidentified word, possibly the player's team slot
        unknown_2: u32,
        /// Unidentified word, possibly a player count
        unknown_3: u32,
    }

    /// Garrison into a target
    0x16 => Enter(EnterCommand) {
        /// Target entity
        target_id: u32,
    }

    /// Send resources to another player
    0x17 => Tribute(TributeCommand) {
        /// Resource sent
        resource: u32,
        /// Receiving player
        to_player: u32,
        /// Amount sent
        amount: u32,
        /// Unidentified trailing word
        unknown_b8: u32,
    }

    /// Transform units
    0x1c => Transform(TransformCommand) {
        /// Unidentified word
        unknown_1: u32,
        /// Unidentified byte
        unknown_2: u8,
    }

    /// Change unit stance
    0x21 => Stance(StanceCommand) {
        /// Stance code
        stance: u8,
    }

    /// Ring the town bell
    0x2a => TownBell(TownBellCommand) {}

    /// Auto-explore
    0x2b => Explore(ExploreCommand) {
        /// Unidentified word
        unknown_1: u32,
    }

    /// Add or remove units from an army
    0x2d => AdjustArmy(AdjustArmyCommand) {
        /// Unidentified byte
        unknown_1: u8,
        /// Army id
        army_id: u32,
    }

    /// Repair a building
    0x2e => Repair(RepairCommand) {
        /// Target entity
        target_id: u32,
    }

    /// Empower a building
    0x2f => Empower(EmpowerCommand) {
        /// Target entity
        target_id: u32,
    }

    /// AI chat or signal
    0x31 => AiChat(AiChatCommand) {
        #[allow(missing_docs)]
        unknown_1: u32,
        #[allow(missing_docs)]
        unknown_2: u32,
        #[allow(missing_docs)]
        unknown_3: u32,
        #[allow(missing_docs)]
        unknown_4: u32,
        #[allow(missing_docs)]
        unknown_5: u32,
        #[allow(missing_docs)]
        unknown_6: u32,
        #[allow(missing_docs)]
        unknown_7: u32,
        /// Location attached to the message
        location: Vector3,
    }

    /// Player data update
    0x32 => PlayerData(PlayerDataCommand) {
        /// Unidentified word
        unknown_1: u32,
    }

    /// Change army formation
    0x33 => Formation(FormationCommand) {
        /// Formation code
        formation: u8,
    }

    /// Cancel a building foundation
    0x35 => Unbuild(UnbuildCommand) {
        /// First vector
        position: Vector3,
        /// Second vector
        facing: Vector3,
    }

    /// Toggle queue repeat
    0x36 => Autoqueue(AutoqueueCommand) {}

    /// Change automatic gathering mode
    0x37 => AutoGatherMode(AutoGatherModeCommand) {
        /// Mode value
        mode: u32,
    }

    /// Spend to finish construction early
    0x38 => SpeedUpConstruction(SpeedUpConstructionCommand) {}

    /// A player left the game
    0x39 => PlayerDisconnect(PlayerDisconnectCommand) [
        /// Departing player, stored ahead of the header
        player_id: u32,
    ] {}
}

fn unsupported_opcode(opcode: u32) -> Unsupported {
    UNRECOVERED_OPCODES
        .iter()
        .find(|(op, _)| *op == opcode)
        .map(|&(opcode, name)| Unsupported::UnrecoveredLayout { opcode, name })
        .unwrap_or(Unsupported::UnknownOpcode(opcode))
}

impl Command {
    /// Wire opcode
    pub fn opcode(&self) -> u32 {
        self.kind().opcode()
    }

    /// Encode a present slot: presence byte, opcode, record body
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u8(1);
        writer.write_u32(self.opcode());
        self.write_body(writer)
    }

    /// Encoded size of [`Self::write`]'s output
    pub fn encoded_len(&self) -> Result<usize> {
        let mut writer = ByteWriter::new();
        self.write(&mut writer)?;
        Ok(writer.len())
    }
}

/// Read one command slot. A zero presence byte yields `None`.
pub fn read_command_slot<R: WireRead>(reader: &mut R) -> Result<Option<Command>> {
    if reader.read_u8()? == 0 {
        return Ok(None);
    }
    let opcode_at = reader.position();
    let opcode = reader.read_u32()?;
    let command = decode_command(opcode, reader).map_err(|e| match e {
        Error::UnsupportedFeature { feature, .. } => Error::unsupported(opcode_at, feature),
        other => other,
    })?;
    log::trace!(
        "Command 0x{:02x} {} at 0x{:x}",
        opcode,
        command.kind().name(),
        opcode_at
    );
    Ok(Some(command))
}

/// Write one command slot, or a zero presence byte for `None`
pub fn write_command_slot(writer: &mut ByteWriter, slot: Option<&Command>) -> Result<()> {
    match slot {
        Some(command) => command.write(writer),
        None => {
            writer.write_u8(0);
            Ok(())
        }
    }
}

impl ResignCommand {
    /// Resignation attributing `player`'s departure to `observer`, laid out
    /// the way the engine records a resign issued from the lobby
    pub fn synthetic(player: u32, observer: u32) -> Self {
        Self {
            header: CommonHeader {
                sequence: Self::OPCODE as u8,
                player: player as i32,
                unknown_28: u32::MAX,
                ai: -1,
                unknown_30: 3,
                unknown_34: vec![player],
                unknown_48: 3,
                recipients: Vec::new(),
                waypoints: Vec::new(),
                flag_bytes: vec![1, 0],
                unknown_8c: 0,
                unknown_90: 0,
                unknown_94: 0,
                urgency: 0,
                event: -1,
                plan: -1,
            },
            resigning_player: observer,
            unknown_2: player,
            unknown_3: observer,
        }
    }
}

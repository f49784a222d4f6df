//! # aom_rcx - Age of Mythology recorded games
//!
//! Decoder, encoder and observer-injecting mutator for `.rcx` recording
//! files.
//!
//! A recording is a zlib-compressed body inside a small envelope, followed by
//! a footer. The body holds a one-time header (settings document, map script,
//! player and team tables) and then one update per simulation tick, each
//! carrying the commands players issued during that tick.
//!
//! ## Features
//!
//! - Envelope and footer validation with typed errors
//! - Every command layout recovered so far, decodable and encodable
//! - Tick-at-a-time reading that keeps earlier ticks when a later one fails
//! - Roster and team resolution, with resign tracking across the game
//! - Observer injection that patches the header, selected ticks and the
//!   footer while copying everything else byte for byte
//!
//! ## Examples
//!
//! ### Inspecting a recording
//!
//! ```no_run
//! use aom_rcx::Recording;
//!
//! # fn main() -> Result<(), aom_rcx::Error> {
//! let recording = Recording::open("game.rcx")?;
//! for player in recording.session.players() {
//!     println!("{}: {}", player.index, player.name);
//! }
//! println!("{} ms, {} commands", recording.duration_ms(), recording.command_count());
//! # Ok(())
//! # }
//! ```
//!
//! ### Adding an observer
//!
//! ```no_run
//! use aom_rcx::{ObserverOptions, inject_observer};
//!
//! # fn main() -> Result<(), aom_rcx::Error> {
//! let raw = std::fs::read("game.rcx")?;
//! let patched = inject_observer(&raw, &ObserverOptions::new("Stu"))?;
//! std::fs::write("game_obs.rcx", patched)?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod commands;
pub mod container;
pub mod cursor;
pub mod error;
pub mod footer;
pub mod header;
pub mod mutator;
pub mod options;
pub mod recording;
pub mod section;
pub mod session;
pub mod settings;
pub mod update;

// Re-export commonly used types
pub use builder::RecordingBuilder;
pub use commands::{Command, CommandKind, CommonHeader};
pub use container::{Container, RECORDING_MAGIC};
pub use error::{Error, ErrorKind, Result, Unsupported};
pub use footer::Footer;
pub use header::{Header, HeaderParser, PlayerAttributes, RosterEntry, TeamDescriptor};
pub use mutator::{Injection, ObserverInjector, ObserverOptions, inject_observer};
pub use options::{EngineVariant, ParseOptions, SyncGate};
pub use recording::{Recording, RecordingReader};
pub use session::{PlayerRecord, Session, TeamRecord};
pub use settings::SettingsDocument;
pub use update::{LoadFlags, TickDecoder, Update};

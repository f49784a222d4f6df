//! Error types for recording decoding, encoding and mutation

use std::io;
use thiserror::Error;

/// Result type alias for recording operations
pub type Result<T> = std::result::Result<T, Error>;

/// A construct the decoder recognises but cannot decode safely.
///
/// None of these can be skipped: the length of the affected record is only
/// known once it has been decoded, so the stream cannot be resynchronised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    /// Opcode with no entry in the command table
    #[error("unknown command opcode 0x{0:02x}")]
    UnknownOpcode(u32),

    /// Opcode that names a command whose wire layout has not been recovered
    #[error("command opcode 0x{opcode:02x} ({name}) has no recovered layout")]
    UnrecoveredLayout {
        /// Raw opcode value
        opcode: u32,
        /// Engine name of the command
        name: &'static str,
    },

    /// The four-byte command count encoding ("many commands" load flag)
    #[error("many-commands tick encoding (load flags 0x{flags:02x})")]
    ManyCommands {
        /// Load flags of the offending tick
        flags: u8,
    },

    /// Sync block layout of the legacy engine build at a low sync version
    #[error("legacy engine sync block at sync version {version}")]
    LegacySyncBlock {
        /// Sync gate version counter
        version: u32,
    },

    /// Injecting commands would overflow the one-byte command count
    #[error("command count overflow: {existing} existing + {added} injected")]
    CommandCountOverflow {
        /// Commands already present in the tick
        existing: u8,
        /// Commands being injected
        added: usize,
    },
}

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed envelope, section framing or settings document
    Format,
    /// Decompression failure or declared size mismatch
    Corruption,
    /// A recognised but undecodable construct
    UnsupportedFeature,
    /// A read past the end of the buffer
    Bounds,
    /// Cross-checked values disagree
    Consistency,
    /// A value that cannot be represented on the wire
    Encode,
    /// Underlying I/O failure
    Io,
}

/// Main error type for recording operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed envelope or section framing
    #[error("Invalid recording format at offset 0x{offset:x}: {message}")]
    Format {
        /// Byte offset where the problem was detected
        offset: usize,
        /// Description of the problem
        message: String,
    },

    /// Decompression failure or size mismatch
    #[error("Recording corrupt: {0}")]
    Corruption(String),

    /// Recognised construct that cannot be decoded
    #[error("Unsupported feature at offset 0x{offset:x}: {feature}")]
    UnsupportedFeature {
        /// Byte offset of the construct
        offset: usize,
        /// What was encountered
        feature: Unsupported,
    },

    /// Read beyond the end of the buffer
    #[error(
        "Read out of bounds at offset 0x{offset:x}: requested {requested} bytes, {available} available"
    )]
    Bounds {
        /// Cursor position of the failed read
        offset: usize,
        /// Number of bytes requested
        requested: usize,
        /// Number of bytes left in the buffer
        available: usize,
    },

    /// Independently declared values disagree
    #[error("Consistency check failed: {0}")]
    Consistency(String),

    /// The embedded settings document could not be read or rewritten
    #[error("Invalid settings document: {0}")]
    Settings(String),

    /// A value cannot be represented in its wire field
    #[error("Cannot encode {0}")]
    Encode(String),

    /// Failure while decoding a specific update tick
    #[error("update #{tick}: {source}")]
    Tick {
        /// Zero-based tick index
        tick: usize,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a new Format error
    pub fn format<S: Into<String>>(offset: usize, msg: S) -> Self {
        Error::Format {
            offset,
            message: msg.into(),
        }
    }

    /// Create a new Corruption error
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create a new Consistency error
    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        Error::Consistency(msg.into())
    }

    /// Create a new Settings error
    pub fn settings<S: Into<String>>(msg: S) -> Self {
        Error::Settings(msg.into())
    }

    /// Create a new Encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Error::Encode(msg.into())
    }

    /// Create a new UnsupportedFeature error
    pub fn unsupported(offset: usize, feature: Unsupported) -> Self {
        Error::UnsupportedFeature { offset, feature }
    }

    /// Attach the tick index to an error raised while decoding an update
    pub fn in_tick(self, tick: usize) -> Self {
        match self {
            Error::Tick { .. } => self,
            other => Error::Tick {
                tick,
                source: Box::new(other),
            },
        }
    }

    /// Classify the error, looking through tick context
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Format { .. } | Error::Settings(_) => ErrorKind::Format,
            Error::Corruption(_) => ErrorKind::Corruption,
            Error::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Error::Bounds { .. } => ErrorKind::Bounds,
            Error::Consistency(_) => ErrorKind::Consistency,
            Error::Encode(_) => ErrorKind::Encode,
            Error::Tick { source, .. } => source.kind(),
        }
    }

    /// The unsupported construct, if this is an UnsupportedFeature error
    pub fn unsupported_feature(&self) -> Option<&Unsupported> {
        match self {
            Error::UnsupportedFeature { feature, .. } => Some(feature),
            Error::Tick { source, .. } => source.unsupported_feature(),
            _ => None,
        }
    }

    /// Check if this error indicates the recording is damaged
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Corruption | ErrorKind::Format | ErrorKind::Bounds
        )
    }
}

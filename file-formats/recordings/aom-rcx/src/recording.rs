//! Whole-file decoding: envelope, header, every tick and the footer.

use crate::container::Container;
use crate::cursor::{ByteReader, WireRead};
use crate::error::Result;
use crate::footer::Footer;
use crate::header::{Header, HeaderParser};
use crate::options::ParseOptions;
use crate::session::Session;
use crate::update::{TickDecoder, Update};
use std::fs;
use std::path::Path;

/// A fully decoded recording
#[derive(Debug, Clone)]
pub struct Recording {
    /// Header tables
    pub header: Header,
    /// Every tick, in order
    pub updates: Vec<Update>,
    /// Parsed footer
    pub footer: Footer,
    /// Roster state after the last tick
    pub session: Session,
    body_len: usize,
    compressed_len: usize,
}

impl Recording {
    /// Decode a recording held in memory with default options
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Self::from_bytes_with(raw, ParseOptions::default())
    }

    /// Decode a recording held in memory
    pub fn from_bytes_with(raw: &[u8], options: ParseOptions) -> Result<Self> {
        let container = Container::decode(raw)?;
        let footer = container.parse_footer()?;

        let mut reader = RecordingReader::new(&container.body, options)?;
        let updates = reader.by_ref().collect::<Result<Vec<_>>>()?;
        let (header, session) = reader.into_parts();
        log::debug!(
            "Decoded {} ticks covering {} ms",
            updates.len(),
            session.clock_ms()
        );

        Ok(Self {
            header,
            updates,
            footer,
            session,
            body_len: container.body.len(),
            compressed_len: container.compressed_len,
        })
    }

    /// Read and decode a recording file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ParseOptions::default())
    }

    /// Read and decode a recording file
    pub fn open_with<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let raw = fs::read(path.as_ref())?;
        log::debug!("Read {} bytes from {}", raw.len(), path.as_ref().display());
        Self::from_bytes_with(&raw, options)
    }

    /// Total game time covered by the ticks
    pub fn duration_ms(&self) -> u64 {
        self.session.clock_ms()
    }

    /// Decompressed body size
    pub fn body_len(&self) -> usize {
        self.body_len
    }

    /// Compressed body size
    pub fn compressed_len(&self) -> usize {
        self.compressed_len
    }

    /// Number of present commands across every tick
    pub fn command_count(&self) -> usize {
        self.updates.iter().map(|u| u.present_commands().count()).sum()
    }
}

/// Tick-at-a-time reader over a decompressed body.
///
/// The header is decoded up front. Iteration yields each tick and stops
/// after the first error, so callers can keep the ticks decoded before it.
#[derive(Debug)]
pub struct RecordingReader<'a> {
    reader: ByteReader<'a>,
    decoder: TickDecoder,
    header: Header,
    session: Session,
    tick: usize,
    failed: bool,
}

impl<'a> RecordingReader<'a> {
    /// Decode the header of `body` and position the reader at the first tick
    pub fn new(body: &'a [u8], options: ParseOptions) -> Result<Self> {
        let mut reader = ByteReader::new(body);
        let header = HeaderParser::new(options).parse(&mut reader)?;
        let session = Session::from_header(&header)?;
        log::debug!("Update stream starts at 0x{:x}", reader.position());
        Ok(Self {
            reader,
            decoder: TickDecoder::new(options),
            header,
            session,
            tick: 0,
            failed: false,
        })
    }

    /// Decoded header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Roster state after the ticks read so far
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Offset of the next tick in the body
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Number of ticks read so far
    pub fn ticks_read(&self) -> usize {
        self.tick
    }

    /// Give up the reader, keeping the header and roster state
    pub fn into_parts(self) -> (Header, Session) {
        (self.header, self.session)
    }
}

impl Iterator for RecordingReader<'_> {
    type Item = Result<Update>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_at_end() {
            return None;
        }
        let start = self.reader.position();
        match self.decoder.read_update(&mut self.reader) {
            Ok(update) => {
                log::trace!(
                    "Tick {} at 0x{:x}: {} bytes, {} command slots",
                    self.tick,
                    start,
                    self.reader.position() - start,
                    update.commands.len()
                );
                self.session.observe(&update);
                self.tick += 1;
                Some(Ok(update))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e.in_tick(self.tick)))
            }
        }
    }
}

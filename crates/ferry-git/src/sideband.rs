//! Side-band multiplexing of the pack stream.
//!
//! Each pkt-line carries a one-byte channel number followed by payload:
//! 1 for pack data, 2 for progress text, 3 for a fatal error message.

use crate::capability::{Capability, CapabilityList};
use crate::pktline::{PktLine, PktLineWriter};
use crate::{GitError, Result};
use std::io::{self, Write};

/// Pack data channel.
pub const CHANNEL_DATA: u8 = 1;
/// Progress channel.
pub const CHANNEL_PROGRESS: u8 = 2;
/// Fatal error channel.
pub const CHANNEL_ERROR: u8 = 3;

/// Negotiated side-band flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sideband {
    /// `side-band`: packets of at most 1000 bytes.
    Sideband,
    /// `side-band-64k`: packets of at most 65520 bytes.
    Sideband64k,
}

impl Sideband {
    /// Largest packet, length prefix and channel byte included.
    pub fn max_packet_len(&self) -> usize {
        match self {
            Self::Sideband => 1000,
            Self::Sideband64k => 65520,
        }
    }

    /// Largest payload per packet.
    pub fn max_payload_len(&self) -> usize {
        self.max_packet_len() - 5
    }

    /// Picks the side-band flavor for a client, if any.
    ///
    /// `no-progress` disables multiplexing entirely; otherwise
    /// `side-band-64k` is preferred over `side-band`.
    pub fn select(caps: &CapabilityList) -> Option<Self> {
        if caps.supports(Capability::NoProgress) {
            None
        } else if caps.supports(Capability::SideBand64k) {
            Some(Self::Sideband64k)
        } else if caps.supports(Capability::SideBand) {
            Some(Self::Sideband)
        } else {
            None
        }
    }
}

/// Writes pack bytes as channel 1 side-band packets.
pub struct Muxer<W> {
    kind: Sideband,
    writer: PktLineWriter<W>,
}

impl<W: Write> Muxer<W> {
    /// Creates a muxer over `writer`.
    pub fn new(kind: Sideband, writer: W) -> Self {
        Self {
            kind,
            writer: PktLineWriter::new(writer),
        }
    }

    /// Negotiated flavor.
    pub fn kind(&self) -> Sideband {
        self.kind
    }

    fn send(&mut self, channel: u8, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(self.kind.max_payload_len()) {
            let mut payload = Vec::with_capacity(chunk.len() + 1);
            payload.push(channel);
            payload.extend_from_slice(chunk);
            self.writer.write(&PktLine::Data(payload))?;
        }
        Ok(())
    }

    /// Sends a progress message on channel 2.
    pub fn progress(&mut self, message: &str) -> Result<()> {
        self.send(CHANNEL_PROGRESS, message.as_bytes())
    }

    /// Sends an error message on channel 3.
    pub fn error(&mut self, message: &str) -> Result<()> {
        self.send(CHANNEL_ERROR, message.as_bytes())
    }

    /// Ends the multiplexed stream with a flush packet.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush_pkt()?;
        self.writer.flush()?;
        Ok(self.writer.into_inner())
    }
}

impl<W: Write> Write for Muxer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.kind.max_payload_len());
        self.send(CHANNEL_DATA, &buf[..n]).map_err(into_io)?;
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.send(CHANNEL_DATA, buf).map_err(into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().map_err(into_io)
    }
}

fn into_io(e: GitError) -> io::Error {
    match e {
        GitError::Io(e) => e,
        other => io::Error::other(other),
    }
}

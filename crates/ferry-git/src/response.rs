//! Server messages of the negotiation phase: acknowledgements and shallow
//! updates.

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::request::parse_id;
use crate::{GitError, Result};
use ferry_storage::ObjectId;
use std::fmt;
use std::io::{Read, Write};

/// Qualifier on an `ACK` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Bare `ACK <id>`.
    Plain,
    /// `continue` (multi_ack).
    Continue,
    /// `common` (multi_ack_detailed).
    Common,
    /// `ready` (multi_ack_detailed).
    Ready,
}

impl AckStatus {
    fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Continue => Some("continue"),
            Self::Common => Some("common"),
            Self::Ready => Some("ready"),
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "continue" => Ok(Self::Continue),
            "common" => Ok(Self::Common),
            "ready" => Ok(Self::Ready),
            other => Err(GitError::Decode(format!("unknown ack status: {:?}", other))),
        }
    }
}

/// A single acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Acknowledged object.
    pub id: ObjectId,
    /// Qualifier.
    pub status: AckStatus,
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ACK {}", self.id)?;
        if let Some(suffix) = self.status.suffix() {
            write!(f, " {}", suffix)?;
        }
        Ok(())
    }
}

/// A server response: a list of acknowledgements, or `NAK` when empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerResponse {
    /// Acknowledgements, in the order they were produced.
    pub acks: Vec<Ack>,
}

impl ServerResponse {
    /// A response with no acknowledgements.
    pub fn nak() -> Self {
        Self::default()
    }

    /// Writes one `ACK` line per acknowledgement, or a single `NAK`.
    pub fn encode<W: Write>(&self, writer: &mut PktLineWriter<W>) -> Result<()> {
        if self.acks.is_empty() {
            return writer.write_line("NAK");
        }
        for ack in &self.acks {
            writer.write_line(&ack.to_string())?;
        }
        Ok(())
    }

    /// Reads a single `ACK` or `NAK` line, the way a client would.
    pub fn decode_line<R: Read>(reader: &mut PktLineReader<R>) -> Result<Option<Ack>> {
        let pkt = reader
            .read()?
            .ok_or_else(|| GitError::Decode("unexpected end of server-response".to_string()))?;
        let line = pkt
            .as_str()
            .ok_or_else(|| GitError::Decode("unexpected packet in server-response".to_string()))?;

        if line == "NAK" {
            return Ok(None);
        }
        let rest = line
            .strip_prefix("ACK ")
            .ok_or_else(|| GitError::Decode(format!("unexpected line: {:?}", line)))?;
        let (hex, status) = match rest.split_once(' ') {
            Some((hex, status)) => (hex, AckStatus::parse(status)?),
            None => (rest, AckStatus::Plain),
        };
        Ok(Some(Ack {
            id: parse_id(hex)?,
            status,
        }))
    }
}

/// Shallow boundary changes sent before negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShallowUpdate {
    /// Commits the client must now treat as shallow.
    pub shallows: Vec<ObjectId>,
    /// Commits whose parents the client will now receive.
    pub unshallows: Vec<ObjectId>,
}

impl ShallowUpdate {
    /// Writes `shallow` lines, then `unshallow` lines, then a flush.
    pub fn encode<W: Write>(&self, writer: &mut PktLineWriter<W>) -> Result<()> {
        for id in &self.shallows {
            writer.write_line(&format!("shallow {}", id))?;
        }
        for id in &self.unshallows {
            writer.write_line(&format!("unshallow {}", id))?;
        }
        writer.flush_pkt()
    }

    /// Reads a shallow update up to its flush.
    pub fn decode<R: Read>(reader: &mut PktLineReader<R>) -> Result<Self> {
        let mut update = Self::default();
        loop {
            let pkt = match reader.read()? {
                Some(PktLine::Flush) => return Ok(update),
                Some(pkt) => pkt,
                None => return Err(GitError::Decode("unexpected end of shallow-update".to_string())),
            };
            let line = pkt
                .as_str()
                .ok_or_else(|| GitError::Decode("unexpected packet in shallow-update".to_string()))?;

            if let Some(hex) = line.strip_prefix("shallow ") {
                update.shallows.push(parse_id(hex)?);
            } else if let Some(hex) = line.strip_prefix("unshallow ") {
                update.unshallows.push(parse_id(hex)?);
            } else {
                return Err(GitError::Decode(format!("unexpected line: {:?}", line)));
            }
        }
    }
}

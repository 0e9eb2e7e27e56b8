//! The client's upload request: wants, shallows, depth and capabilities.

use crate::capability::CapabilityList;
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::{GitError, Result};
use ferry_storage::ObjectId;
use std::collections::HashSet;
use std::io::{Read, Write};

/// How far the client wants history to go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Depth {
    /// Full history.
    #[default]
    None,
    /// `deepen <n>`: at most `n` commits from each want.
    Commits(u32),
    /// `deepen-since <timestamp>`
    Since(i64),
    /// `deepen-not <ref>`
    Reference(String),
}

impl Depth {
    /// Returns true when no shallow computation is needed.
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::None | Self::Commits(0))
    }

    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Commits(_) => "deepen",
            Self::Since(_) => "deepen-since",
            Self::Reference(_) => "deepen-not",
        }
    }
}

/// A decoded upload request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadRequest {
    /// Objects the client wants, in first-seen order without duplicates.
    pub wants: Vec<ObjectId>,
    /// Commits the client already has as shallow.
    pub shallows: Vec<ObjectId>,
    /// Requested history depth.
    pub depth: Depth,
    /// Capabilities declared on the first want line.
    pub capabilities: CapabilityList,
}

impl UploadRequest {
    /// Decodes a request up to and including its terminating flush.
    pub fn decode<R: Read>(reader: &mut PktLineReader<R>) -> Result<Self> {
        let mut request = Self::default();
        let mut seen_wants: HashSet<ObjectId> = HashSet::new();
        let mut seen_shallows: HashSet<ObjectId> = HashSet::new();

        loop {
            let pkt = match reader.read()? {
                Some(PktLine::Flush) => break,
                Some(pkt) => pkt,
                None => return Err(GitError::Decode("unexpected end of upload-request".to_string())),
            };
            let line = pkt
                .as_str()
                .ok_or_else(|| GitError::Decode("unexpected packet in upload-request".to_string()))?;

            if let Some(rest) = line.strip_prefix("want ") {
                let (hex, caps) = rest.split_once(' ').unwrap_or((rest, ""));
                let id = parse_id(hex)?;
                if request.wants.is_empty() {
                    request.capabilities = CapabilityList::parse(caps);
                }
                if seen_wants.insert(id) {
                    request.wants.push(id);
                }
            } else if let Some(hex) = line.strip_prefix("shallow ") {
                let id = parse_id(hex)?;
                if seen_shallows.insert(id) {
                    request.shallows.push(id);
                }
            } else if let Some(n) = line.strip_prefix("deepen ") {
                let n = n
                    .parse()
                    .map_err(|_| GitError::Decode(format!("invalid deepen value: {}", n)))?;
                request.set_depth(Depth::Commits(n))?;
            } else if let Some(ts) = line.strip_prefix("deepen-since ") {
                let ts = ts
                    .parse()
                    .map_err(|_| GitError::Decode(format!("invalid deepen-since value: {}", ts)))?;
                request.set_depth(Depth::Since(ts))?;
            } else if let Some(name) = line.strip_prefix("deepen-not ") {
                request.set_depth(Depth::Reference(name.to_string()))?;
            } else {
                return Err(GitError::Decode(format!("unexpected line: {:?}", line)));
            }
        }

        if request.wants.is_empty() {
            return Err(GitError::Decode("upload-request has no wants".to_string()));
        }
        Ok(request)
    }

    fn set_depth(&mut self, depth: Depth) -> Result<()> {
        if self.depth != Depth::None {
            return Err(GitError::Decode(format!(
                "{} conflicts with earlier {}",
                depth.kind(),
                self.depth.kind()
            )));
        }
        self.depth = depth;
        Ok(())
    }

    /// Encodes the request the way a client sends it.
    pub fn encode<W: Write>(&self, writer: &mut PktLineWriter<W>) -> Result<()> {
        for (i, want) in self.wants.iter().enumerate() {
            if i == 0 && !self.capabilities.is_empty() {
                writer.write_line(&format!("want {} {}", want, self.capabilities))?;
            } else {
                writer.write_line(&format!("want {}", want))?;
            }
        }
        for shallow in &self.shallows {
            writer.write_line(&format!("shallow {}", shallow))?;
        }
        match &self.depth {
            Depth::None => {}
            Depth::Commits(n) => writer.write_line(&format!("deepen {}", n))?,
            Depth::Since(ts) => writer.write_line(&format!("deepen-since {}", ts))?,
            Depth::Reference(name) => writer.write_line(&format!("deepen-not {}", name))?,
        }
        writer.flush_pkt()
    }
}

pub(crate) fn parse_id(hex: &str) -> Result<ObjectId> {
    ObjectId::from_hex(hex).map_err(|_| GitError::Decode(format!("invalid object id: {:?}", hex)))
}

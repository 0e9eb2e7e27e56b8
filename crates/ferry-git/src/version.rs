//! Protocol version selection from `GIT_PROTOCOL`.

use crate::{GitError, PktLineWriter, Result};
use std::fmt;
use std::io::Write;

/// Wire protocol versions a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// The original protocol.
    #[default]
    V0,
    /// V0 preceded by a `version 1` announcement.
    V1,
    /// Command-based protocol. Served as V0.
    V2,
}

impl ProtocolVersion {
    /// Parses the value of the `GIT_PROTOCOL` environment variable.
    ///
    /// The value is a colon-separated list of `key=value` fields; only
    /// `version` is read. A missing or empty value means V0.
    pub fn from_git_protocol(value: &str) -> Result<Self> {
        let mut version = Self::V0;
        for field in value.split(':') {
            if let Some(v) = field.strip_prefix("version=") {
                version = match v {
                    "0" => Self::V0,
                    "1" => Self::V1,
                    "2" => Self::V2,
                    other => return Err(GitError::UnknownVersion(other.to_string())),
                };
            }
        }
        Ok(version)
    }

    /// Writes the version announcement, if this version has one.
    pub fn announce<W: Write>(&self, writer: &mut PktLineWriter<W>) -> Result<()> {
        if *self == Self::V1 {
            writer.write_line("version 1")?;
        }
        Ok(())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Self::V0 => 0,
            Self::V1 => 1,
            Self::V2 => 2,
        };
        write!(f, "{}", n)
    }
}

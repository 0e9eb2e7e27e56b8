//! Have batches sent by the client during negotiation.

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::request::parse_id;
use crate::{GitError, Result};
use ferry_storage::ObjectId;
use std::io::{Read, Write};

/// One round of `have` lines, ended by a flush or by `done`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadHaves {
    /// Objects the client claims to have, in the order sent.
    pub haves: Vec<ObjectId>,
    /// The client has finished negotiating.
    pub done: bool,
}

impl UploadHaves {
    /// Decodes the next batch.
    ///
    /// Returns `Ok(None)` if the input ends before the batch starts, which
    /// a stateless-RPC client does between rounds.
    pub fn decode<R: Read>(reader: &mut PktLineReader<R>) -> Result<Option<Self>> {
        let mut batch = Self::default();
        let mut started = false;

        loop {
            let pkt = match reader.read()? {
                Some(PktLine::Flush) => return Ok(Some(batch)),
                Some(pkt) => pkt,
                None if !started => return Ok(None),
                None => return Err(GitError::Decode("unexpected end of upload-haves".to_string())),
            };
            started = true;

            let line = pkt
                .as_str()
                .ok_or_else(|| GitError::Decode("unexpected packet in upload-haves".to_string()))?;

            if let Some(hex) = line.strip_prefix("have ") {
                batch.haves.push(parse_id(hex)?);
            } else if line == "done" {
                batch.done = true;
                return Ok(Some(batch));
            } else {
                return Err(GitError::Decode(format!("unexpected line: {:?}", line)));
            }
        }
    }

    /// Encodes the batch the way a client sends it.
    pub fn encode<W: Write>(&self, writer: &mut PktLineWriter<W>) -> Result<()> {
        for have in &self.haves {
            writer.write_line(&format!("have {}", have))?;
        }
        if self.done {
            writer.write_line("done")
        } else {
            writer.flush_pkt()
        }
    }
}

//! The upload-pack service: advertisement, negotiation and pack transfer
//! for one client connection.
//!
//! See: https://git-scm.com/docs/pack-protocol#_packfile_negotiation

use crate::advertise::advertise_refs;
use crate::cancel::CancellationFlag;
use crate::error::{Phase, ResultExt};
use crate::haves::UploadHaves;
use crate::negotiation::{AckMode, Negotiator};
use crate::pack::{PackEncoder, DEFAULT_PACK_WORKERS};
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::request::{Depth, UploadRequest};
use crate::response::ShallowUpdate;
use crate::shallow;
use crate::sideband::{Muxer, Sideband};
use crate::version::ProtocolVersion;
use crate::{GitError, Result};
use ferry_storage::{revlist, BufferPool, ObjectId, Repository};
use std::collections::HashSet;
use std::io::{Read, Write};

/// Options for one upload-pack invocation.
#[derive(Debug, Clone)]
pub struct UploadPackOptions {
    /// Value of the `GIT_PROTOCOL` environment variable, possibly empty.
    pub git_protocol: String,
    /// Only advertise references, then stop.
    pub advertise_refs: bool,
    /// Smart-HTTP mode: one request/response round per invocation.
    pub stateless_rpc: bool,
    /// Compression workers for the pack encoder.
    pub pack_workers: usize,
    /// Checked between phases.
    pub interrupt: CancellationFlag,
}

impl Default for UploadPackOptions {
    fn default() -> Self {
        Self {
            git_protocol: String::new(),
            advertise_refs: false,
            stateless_rpc: false,
            pack_workers: DEFAULT_PACK_WORKERS,
            interrupt: CancellationFlag::new(),
        }
    }
}

/// Serves one upload-pack exchange over `reader` and `writer`.
///
/// Errors are annotated with the [`Phase`] they occurred in. When a
/// side-band was negotiated and packing fails, the error is also sent to
/// the client on the error channel.
pub fn upload_pack<R: Read, W: Write>(
    repo: &Repository,
    reader: R,
    writer: W,
    options: &UploadPackOptions,
    pool: &BufferPool,
) -> Result<()> {
    let version = ProtocolVersion::from_git_protocol(&options.git_protocol)?;
    if version == ProtocolVersion::V2 {
        tracing::debug!(repo = %repo.name, "protocol v2 requested, serving v0");
    }

    let interrupt = &options.interrupt;
    let mut out = PktLineWriter::new(writer);

    interrupt.check().phase(Phase::Advertising)?;
    version.announce(&mut out).phase(Phase::Advertising)?;
    if options.advertise_refs || !options.stateless_rpc {
        advertise_refs(out.get_mut(), repo, options.stateless_rpc).phase(Phase::Advertising)?;
    }
    if options.advertise_refs {
        return out.flush().phase(Phase::Closing);
    }

    let mut input = PktLineReader::new(reader);

    interrupt.check().phase(Phase::Peeking)?;
    if matches!(input.peek().phase(Phase::Peeking)?, None | Some(PktLine::Flush)) {
        tracing::debug!(repo = %repo.name, "client wants nothing");
        return out.flush().phase(Phase::Closing);
    }

    interrupt.check().phase(Phase::DecodingRequest)?;
    let request = UploadRequest::decode(&mut input).phase(Phase::DecodingRequest)?;
    tracing::debug!(
        repo = %repo.name,
        wants = request.wants.len(),
        shallows = request.shallows.len(),
        depth = ?request.depth,
        capabilities = %request.capabilities,
        "decoded upload request"
    );

    let update = match &request.depth {
        depth if depth.is_zero() => None,
        Depth::Commits(depth) => {
            interrupt.check().phase(Phase::SendingShallowUpdate)?;
            let update = shallow::compute(&repo.objects, &request.wants, *depth)
                .phase(Phase::SendingShallowUpdate)?;
            update.encode(&mut out).phase(Phase::SendingShallowUpdate)?;
            out.flush().phase(Phase::SendingShallowUpdate)?;
            Some(update)
        }
        other => {
            return Err(GitError::UnsupportedDepth(other.kind())).phase(Phase::SendingShallowUpdate);
        }
    };

    interrupt.check().phase(Phase::IndexingHaves)?;
    let index = revlist::objects_with_ref(&repo.objects, &request.wants).phase(Phase::IndexingHaves)?;

    let mut negotiator = Negotiator::new(AckMode::from_capabilities(&request.capabilities), &index);
    loop {
        interrupt.check().phase(Phase::DecodingHaves)?;
        let batch = match UploadHaves::decode(&mut input).phase(Phase::DecodingHaves)? {
            Some(batch) => batch,
            None if options.stateless_rpc => {
                tracing::debug!(
                    repo = %repo.name,
                    haves = negotiator.haves().len(),
                    "client ended the round before done"
                );
                return out.flush().phase(Phase::Closing);
            }
            None => {
                return Err(GitError::Decode("unexpected end of upload-haves".to_string()))
                    .phase(Phase::DecodingHaves);
            }
        };

        let outcome = negotiator.process(&batch);
        tracing::debug!(
            repo = %repo.name,
            mode = ?negotiator.mode(),
            haves = batch.haves.len(),
            common = outcome.common.len(),
            done = batch.done,
            "processed have batch"
        );

        for response in &outcome.responses {
            response.encode(&mut out).phase(Phase::Acking)?;
        }
        out.flush().phase(Phase::Acking)?;

        if batch.done {
            break;
        }
    }
    let haves = negotiator.into_haves();

    interrupt.check().phase(Phase::ResolvingObjects)?;
    let boundary = shallow_boundary(update.as_ref(), &request);
    let objects = revlist::objects(&repo.objects, &request.wants, &haves, &boundary)
        .phase(Phase::ResolvingObjects)?;

    interrupt.check().phase(Phase::EncodingPack)?;
    let sideband = Sideband::select(&request.capabilities);
    let encoder = PackEncoder::new(&repo.objects, pool);
    let written = match sideband {
        Some(kind) => {
            let mut muxer = Muxer::new(kind, out.get_mut());
            muxer
                .progress(&format!("Enumerating objects: {}, done.\n", objects.len()))
                .phase(Phase::EncodingPack)?;

            match encoder.encode(&mut muxer, &objects, options.pack_workers) {
                Ok(written) => {
                    muxer.finish().phase(Phase::Closing)?;
                    written
                }
                Err(e) => {
                    if let Err(send) = muxer.error(&format!("{}\n", e)) {
                        tracing::debug!(error = %send, "could not report pack error to client");
                    }
                    return Err(e).phase(Phase::EncodingPack);
                }
            }
        }
        None => encoder
            .encode(out.get_mut(), &objects, options.pack_workers)
            .phase(Phase::EncodingPack)?,
    };
    out.flush().phase(Phase::Closing)?;

    tracing::info!(
        repo = %repo.name,
        wants = request.wants.len(),
        haves = haves.len(),
        objects = objects.len(),
        bytes = written,
        sideband = ?sideband,
        "upload-pack complete"
    );
    Ok(())
}

/// Commits the object walk must not descend past.
fn shallow_boundary(update: Option<&ShallowUpdate>, request: &UploadRequest) -> HashSet<ObjectId> {
    match update {
        Some(update) => update.shallows.iter().copied().collect(),
        None => request.shallows.iter().copied().collect(),
    }
}

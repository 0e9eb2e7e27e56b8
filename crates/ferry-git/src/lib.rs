//! Server side of the git upload-pack protocol (v0 and v1).
//!
//! This crate implements the pieces a fetch or clone needs from the server:
//! pkt-line framing, reference advertisement, want/have negotiation,
//! shallow boundaries, side-band multiplexing and pack encoding. The entry
//! point is [`upload_pack`].

pub mod advertise;
mod cancel;
mod capability;
mod error;
mod haves;
mod negotiation;
mod pack;
mod pktline;
mod request;
mod response;
pub mod shallow;
mod sideband;
mod upload_pack;
mod version;

pub use advertise::{advertise_refs, server_capabilities, AGENT};
pub use cancel::CancellationFlag;
pub use capability::{Capability, CapabilityList};
pub use error::{GitError, Phase, ResultExt};
pub use haves::UploadHaves;
pub use negotiation::{AckMode, BatchOutcome, Negotiator};
pub use pack::{PackEncoder, PackParser, DEFAULT_PACK_WORKERS};
pub use pktline::{PktLine, PktLineReader, PktLineWriter, MAX_PAYLOAD_LEN, MAX_PKT_LEN};
pub use request::{Depth, UploadRequest};
pub use response::{Ack, AckStatus, ServerResponse, ShallowUpdate};
pub use shallow::INFINITE_DEPTH;
pub use sideband::{Muxer, Sideband, CHANNEL_DATA, CHANNEL_ERROR, CHANNEL_PROGRESS};
pub use upload_pack::{upload_pack, UploadPackOptions};
pub use version::ProtocolVersion;

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;

//! Reference advertisement for upload-pack.
//!
//! See: https://git-scm.com/docs/pack-protocol#_reference_discovery

use crate::capability::{Capability, CapabilityList};
use crate::pktline::{PktLine, PktLineWriter};
use crate::Result;
use ferry_storage::{ObjectId, ObjectStore, ObjectType, Reference, Repository, Tag};
use std::io::Write;

/// Name reported in the `agent` capability.
pub const AGENT: &str = concat!("ferry/", env!("CARGO_PKG_VERSION"));

/// Name of the service, as sent in the smart-HTTP preamble.
pub const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";

/// Tag chains longer than this are not peeled.
const MAX_PEEL_DEPTH: usize = 16;

/// Capabilities advertised on the first ref line.
pub fn server_capabilities(repo: &Repository) -> CapabilityList {
    let mut caps = CapabilityList::new();
    for cap in [
        Capability::MultiAck,
        Capability::MultiAckDetailed,
        Capability::SideBand,
        Capability::SideBand64k,
        Capability::Shallow,
        Capability::NoProgress,
    ] {
        caps.add(cap);
    }

    if let Some(target) = repo.refs.head_target() {
        if repo.refs.resolve_head().is_ok() {
            caps.add_value(Capability::Symref, format!("HEAD:{}", target));
        }
    }
    caps.add_value(Capability::Agent, AGENT);
    caps
}

/// Advertises references to a client (for fetch/clone).
///
/// In stateless-RPC mode the smart-HTTP `# service=` preamble comes first.
/// HEAD is listed first when it resolves, then every direct ref in name
/// order, each annotated tag followed by its peeled `^{}` line.
pub fn advertise_refs<W: Write>(writer: &mut W, repo: &Repository, stateless_rpc: bool) -> Result<()> {
    let mut pkt_writer = PktLineWriter::new(writer);

    if stateless_rpc {
        pkt_writer.write_line(&format!("# service={}", UPLOAD_PACK_SERVICE))?;
        pkt_writer.flush_pkt()?;
    }

    let mut lines: Vec<(ObjectId, String)> = Vec::new();
    if let Ok(head) = repo.refs.resolve_head() {
        lines.push((head, "HEAD".to_string()));
    }
    for (name, reference) in repo.refs.list("refs/") {
        if let Reference::Direct(id) = reference {
            lines.push((id, name.clone()));
            if let Some(peeled) = peel(&repo.objects, id) {
                lines.push((peeled, format!("{}^{{}}", name)));
            }
        }
    }

    let caps = server_capabilities(repo);
    match lines.split_first() {
        Some(((id, name), rest)) => {
            pkt_writer.write(&PktLine::from_string(&format!("{} {}\0{}\n", id, name, caps)))?;
            for (id, name) in rest {
                pkt_writer.write_line(&format!("{} {}", id, name))?;
            }
        }
        None => {
            // Empty repository
            pkt_writer.write(&PktLine::from_string(&format!(
                "{} capabilities^{{}}\0{}\n",
                ObjectId::ZERO,
                caps
            )))?;
        }
    }

    pkt_writer.flush_pkt()?;
    pkt_writer.flush()?;

    tracing::debug!(refs = lines.len(), stateless_rpc, "advertised references");
    Ok(())
}

/// Follows annotated tags down to the first non-tag object.
///
/// Returns `None` when `id` is not a tag or cannot be read.
fn peel(store: &ObjectStore, id: ObjectId) -> Option<ObjectId> {
    let mut current = id;
    for _ in 0..MAX_PEEL_DEPTH {
        let object = store.get(&current).ok()?;
        if object.object_type != ObjectType::Tag {
            break;
        }
        current = Tag::decode(&object).ok()?.target;
    }
    (current != id).then_some(current)
}

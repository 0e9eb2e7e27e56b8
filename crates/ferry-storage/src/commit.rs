//! Decoded views over commits, trees and tags.
//!
//! Only the fields needed to walk the object graph are decoded; the raw
//! bytes stay on the [`GitObject`].

use crate::{GitObject, ObjectId, ObjectStore, ObjectType, Result, StorageError};
use smallvec::SmallVec;

/// A decoded commit header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// The commit's own id.
    pub id: ObjectId,
    /// Root tree of the commit.
    pub tree: ObjectId,
    parents: SmallVec<[ObjectId; 2]>,
}

impl Commit {
    /// Decodes a commit from an encoded object.
    pub fn decode(object: &GitObject) -> Result<Self> {
        if object.object_type != ObjectType::Commit {
            return Err(StorageError::InvalidObject(format!(
                "{} is a {}, not a commit",
                object.id,
                object.object_type.as_str()
            )));
        }

        let mut tree = None;
        let mut parents = SmallVec::new();

        for line in header_lines(&object.data) {
            if let Some(hex) = line.strip_prefix(b"tree ") {
                tree = Some(parse_hex_id(hex)?);
            } else if let Some(hex) = line.strip_prefix(b"parent ") {
                parents.push(parse_hex_id(hex)?);
            }
        }

        let tree = tree.ok_or_else(|| {
            StorageError::InvalidObject(format!("commit {} has no tree", object.id))
        })?;

        Ok(Self {
            id: object.id,
            tree,
            parents,
        })
    }

    /// Looks up `id` in the store and decodes it as a commit.
    pub fn lookup(store: &ObjectStore, id: &ObjectId) -> Result<Self> {
        Self::decode(&store.get(id)?)
    }

    /// Parent ids in header order.
    pub fn parents(&self) -> impl ExactSizeIterator<Item = ObjectId> + '_ {
        self.parents.iter().copied()
    }

    /// Number of parents.
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }
}

/// Mode of a gitlink (submodule) tree entry.
pub const GITLINK_MODE: u32 = 0o160000;

/// A single tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File mode, parsed from octal.
    pub mode: u32,
    /// Entry name.
    pub name: String,
    /// Target object.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Returns true if the entry points at a subtree.
    pub fn is_tree(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }

    /// Returns true for submodule commits, which live in another repository.
    pub fn is_gitlink(&self) -> bool {
        self.mode == GITLINK_MODE
    }
}

/// A decoded tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Entries in stored order.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Decodes the binary tree format: `<mode> <name>\0<20-byte id>` repeated.
    pub fn decode(object: &GitObject) -> Result<Self> {
        if object.object_type != ObjectType::Tree {
            return Err(StorageError::InvalidObject(format!(
                "{} is a {}, not a tree",
                object.id,
                object.object_type.as_str()
            )));
        }

        let mut entries = Vec::new();
        let mut rest: &[u8] = &object.data;

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| invalid_tree(&object.id, "missing mode separator"))?;
            let mode_str = std::str::from_utf8(&rest[..space])
                .map_err(|_| invalid_tree(&object.id, "non-ascii mode"))?;
            let mode = u32::from_str_radix(mode_str, 8)
                .map_err(|_| invalid_tree(&object.id, "invalid mode"))?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| invalid_tree(&object.id, "missing name terminator"))?;
            let name = String::from_utf8_lossy(&rest[..nul]).into_owned();
            rest = &rest[nul + 1..];

            if rest.len() < 20 {
                return Err(invalid_tree(&object.id, "truncated entry id"));
            }
            let id = ObjectId::from_slice(&rest[..20])?;
            rest = &rest[20..];

            entries.push(TreeEntry { mode, name, id });
        }

        Ok(Self { entries })
    }
}

/// A decoded annotated tag header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// The tagged object.
    pub target: ObjectId,
    /// Type of the tagged object.
    pub target_type: ObjectType,
}

impl Tag {
    /// Decodes the `object` and `type` headers of a tag.
    pub fn decode(object: &GitObject) -> Result<Self> {
        if object.object_type != ObjectType::Tag {
            return Err(StorageError::InvalidObject(format!(
                "{} is a {}, not a tag",
                object.id,
                object.object_type.as_str()
            )));
        }

        let mut target = None;
        let mut target_type = None;
        for line in header_lines(&object.data) {
            if let Some(hex) = line.strip_prefix(b"object ") {
                target = Some(parse_hex_id(hex)?);
            } else if let Some(kind) = line.strip_prefix(b"type ") {
                let kind = std::str::from_utf8(kind)
                    .map_err(|_| StorageError::InvalidObject("non-ascii tag type".to_string()))?;
                target_type = Some(ObjectType::parse(kind)?);
            }
        }

        match (target, target_type) {
            (Some(target), Some(target_type)) => Ok(Self {
                target,
                target_type,
            }),
            _ => Err(StorageError::InvalidObject(format!(
                "tag {} is missing its target",
                object.id
            ))),
        }
    }
}

/// Iterates header lines up to the blank line separating the message.
fn header_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n').take_while(|line| !line.is_empty())
}

fn parse_hex_id(hex: &[u8]) -> Result<ObjectId> {
    let hex = std::str::from_utf8(hex)
        .map_err(|_| StorageError::InvalidObject("non-ascii object id".to_string()))?;
    ObjectId::from_hex(hex.trim_end())
}

fn invalid_tree(id: &ObjectId, reason: &str) -> StorageError {
    StorageError::InvalidObject(format!("tree {}: {}", id, reason))
}

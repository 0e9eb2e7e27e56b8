//! Git object storage for Ferry.
//!
//! This crate provides content-addressed storage for git objects, reference
//! management, loading of on-disk repositories, reachability walks over the
//! object graph, and a bounded pool of byte buffers.

mod commit;
mod error;
mod object;
mod pool;
mod refs;
pub mod revlist;
mod store;

pub use commit::{Commit, Tag, Tree, TreeEntry, GITLINK_MODE};
pub use error::StorageError;
pub use object::{GitObject, ObjectId, ObjectType};
pub use pool::{BufferPool, PooledBuffer, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE};
pub use refs::{RefStore, Reference};
pub use store::{ObjectStore, Repository};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

//! Object store and repository management.

use crate::{BufferPool, GitObject, ObjectId, ObjectType, RefStore, Result, StorageError};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Content-addressed object store.
#[derive(Debug, Default)]
pub struct ObjectStore {
    /// Objects indexed by their SHA-1 hash.
    objects: RwLock<HashMap<ObjectId, GitObject>>,
}

impl ObjectStore {
    /// Creates a new empty object store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object and returns its ID.
    pub fn put(&self, object: GitObject) -> ObjectId {
        let id = object.id;
        self.objects.write().insert(id, object);
        id
    }

    /// Retrieves an object by ID.
    pub fn get(&self, id: &ObjectId) -> Result<GitObject> {
        self.objects
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound(id.to_hex()))
    }

    /// Returns the type of an object without cloning its data.
    pub fn object_type(&self, id: &ObjectId) -> Result<ObjectType> {
        self.objects
            .read()
            .get(id)
            .map(|object| object.object_type)
            .ok_or_else(|| StorageError::ObjectNotFound(id.to_hex()))
    }

    /// Checks if an object exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.read().contains_key(id)
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Stores a blob and returns its ID.
    pub fn put_blob(&self, content: impl Into<Bytes>) -> ObjectId {
        self.put(GitObject::blob(content))
    }

    /// Compresses an object into the loose-object encoding.
    pub fn compress(object: &GitObject) -> Result<Vec<u8>> {
        let header = format!("{} {}\0", object.object_type.as_str(), object.data.len());
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(header.as_bytes())
            .map_err(|e| StorageError::Compression(e.to_string()))?;
        encoder
            .write_all(&object.data)
            .map_err(|e| StorageError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| StorageError::Compression(e.to_string()))
    }

    /// Decompresses a loose object.
    pub fn decompress(compressed: &[u8]) -> Result<GitObject> {
        let mut decoder = ZlibDecoder::new(compressed);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| StorageError::Compression(e.to_string()))?;

        // Header: "type size\0data"
        let null_pos = decompressed.iter().position(|&b| b == 0).ok_or_else(|| {
            StorageError::InvalidObject("missing null byte in header".to_string())
        })?;

        let header = String::from_utf8_lossy(&decompressed[..null_pos]);
        let (kind, size) = header.split_once(' ').ok_or_else(|| {
            StorageError::InvalidObject(format!("invalid header: {}", header))
        })?;

        let object_type = ObjectType::parse(kind)?;
        let size: usize = size
            .parse()
            .map_err(|_| StorageError::InvalidObject("invalid size".to_string()))?;

        let data = &decompressed[null_pos + 1..];
        if data.len() != size {
            return Err(StorageError::InvalidObject(format!(
                "size mismatch: header says {}, found {}",
                size,
                data.len()
            )));
        }

        Ok(GitObject::new(object_type, Bytes::copy_from_slice(data)))
    }

    /// Loads every loose object under `objects_dir` (a `.git/objects`
    /// directory) and returns how many were read.
    ///
    /// Objects stored in packfiles are not read.
    pub fn load_loose(&self, objects_dir: &Path, pool: &BufferPool) -> Result<usize> {
        let mut loaded = 0;

        for fanout in std::fs::read_dir(objects_dir)? {
            let fanout = fanout?;
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
                if prefix == "pack" {
                    tracing::debug!(dir = %fanout.path().display(), "skipping pack directory");
                }
                continue;
            }

            for entry in std::fs::read_dir(fanout.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().into_owned();
                let expected = match ObjectId::from_hex(&format!("{}{}", prefix, rest)) {
                    Ok(id) => id,
                    Err(_) => continue,
                };

                let mut compressed = pool.checkout();
                pool.copy(&mut *compressed, &mut File::open(entry.path())?)?;
                let object = Self::decompress(&compressed)?;

                if object.id != expected {
                    return Err(StorageError::InvalidObject(format!(
                        "loose object {} hashes to {}",
                        expected, object.id
                    )));
                }

                self.put(object);
                loaded += 1;
            }
        }

        tracing::debug!(dir = %objects_dir.display(), loaded, "loaded loose objects");
        Ok(loaded)
    }
}

/// A git repository with objects and references.
#[derive(Debug)]
pub struct Repository {
    /// Repository name.
    pub name: String,
    /// Object store.
    pub objects: Arc<ObjectStore>,
    /// Reference store.
    pub refs: Arc<RefStore>,
}

impl Repository {
    /// Creates a new empty repository whose HEAD points at `refs/heads/main`.
    pub fn new(name: impl Into<String>) -> Self {
        let refs = Arc::new(RefStore::new());
        refs.set_symbolic("HEAD", "refs/heads/main");

        Self {
            name: name.into(),
            objects: Arc::new(ObjectStore::new()),
            refs,
        }
    }

    /// Opens an on-disk git directory, loading its loose objects and refs.
    ///
    /// A work tree is accepted too: without `objects/`, `<path>/.git` is
    /// opened instead.
    pub fn open(path: &Path, pool: &BufferPool) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let dot_git = path.join(".git");
        let git_dir = if !path.join("objects").is_dir() && dot_git.is_dir() {
            tracing::debug!(path = %path.display(), "opening work tree's .git directory");
            dot_git
        } else {
            path.to_path_buf()
        };

        let objects = ObjectStore::new();
        objects.load_loose(&git_dir.join("objects"), pool)?;
        let refs = RefStore::load(&git_dir)?;

        Ok(Self {
            name,
            objects: Arc::new(objects),
            refs: Arc::new(refs),
        })
    }

    /// Updates a reference.
    pub fn update_ref(&self, name: &str, target: ObjectId) {
        self.refs.set(name, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_store_roundtrip() {
        let store = ObjectStore::new();
        let id = store.put_blob(b"Hello, World!".to_vec());

        let retrieved = store.get(&id).unwrap();
        assert_eq!(retrieved.data.as_ref(), b"Hello, World!");
        assert_eq!(store.object_type(&id).unwrap(), ObjectType::Blob);
        assert!(store.contains(&id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_object_store_missing() {
        let store = ObjectStore::new();
        let id = ObjectId::from_bytes([1u8; 20]);
        assert!(matches!(store.get(&id), Err(StorageError::ObjectNotFound(_))));
        assert!(store.object_type(&id).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_object_compression_roundtrip() {
        let original = GitObject::blob(b"Hello, World!".to_vec());
        let compressed = ObjectStore::compress(&original).unwrap();
        let decompressed = ObjectStore::decompress(&compressed).unwrap();

        assert_eq!(original.id, decompressed.id);
        assert_eq!(original.object_type, decompressed.object_type);
        assert_eq!(original.data, decompressed.data);
    }

    #[test]
    fn test_decompress_size_mismatch() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"blob 10\0short").unwrap();
        let compressed = encoder.finish().unwrap();

        assert!(matches!(
            ObjectStore::decompress(&compressed),
            Err(StorageError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_load_loose_objects() {
        let dir = tempfile::tempdir().unwrap();
        let objects_dir = dir.path().join("objects");
        std::fs::create_dir_all(objects_dir.join("pack")).unwrap();

        let blob = GitObject::blob(b"loose\n".to_vec());
        let hex = blob.id.to_hex();
        let fanout = objects_dir.join(&hex[..2]);
        std::fs::create_dir_all(&fanout).unwrap();
        std::fs::write(fanout.join(&hex[2..]), ObjectStore::compress(&blob).unwrap()).unwrap();

        let store = ObjectStore::new();
        let pool = BufferPool::new(16, 2);
        assert_eq!(store.load_loose(&objects_dir, &pool).unwrap(), 1);
        assert_eq!(store.get(&blob.id).unwrap().data.as_ref(), b"loose\n");
        assert_eq!(pool.borrowed(), 0);
    }

    #[test]
    fn test_load_loose_rejects_misnamed_object() {
        let dir = tempfile::tempdir().unwrap();
        let objects_dir = dir.path().join("objects");
        let blob = GitObject::blob(b"content".to_vec());
        let fanout = objects_dir.join("ab");
        std::fs::create_dir_all(&fanout).unwrap();
        std::fs::write(fanout.join("c".repeat(38)), ObjectStore::compress(&blob).unwrap()).unwrap();

        let store = ObjectStore::new();
        let result = store.load_loose(&objects_dir, &BufferPool::default());
        assert!(matches!(result, Err(StorageError::InvalidObject(_))));
    }

    #[test]
    fn test_repository_new_has_symbolic_head() {
        let repo = Repository::new("test-repo");
        assert_eq!(repo.name, "test-repo");
        assert_eq!(repo.refs.head_target(), Some("refs/heads/main".to_string()));
        assert!(repo.refs.resolve_head().is_err());

        let id = repo.objects.put_blob(b"x".to_vec());
        repo.update_ref("refs/heads/main", id);
        assert_eq!(repo.refs.resolve_head().unwrap(), id);
        assert_eq!(repo.refs.list("").len(), 2);
    }

    fn write_git_dir(git_dir: &Path, object: &GitObject) {
        let hex = object.id.to_hex();
        let fanout = git_dir.join("objects").join(&hex[..2]);
        std::fs::create_dir_all(&fanout).unwrap();
        std::fs::write(fanout.join(&hex[2..]), ObjectStore::compress(object).unwrap()).unwrap();
        std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(git_dir.join("refs/heads/main"), format!("{}\n", object.id)).unwrap();
    }

    #[test]
    fn test_open_work_tree_uses_dot_git() {
        let dir = tempfile::tempdir().unwrap();
        let work_tree = dir.path().join("site");
        let blob = GitObject::blob(b"checked out\n".to_vec());
        write_git_dir(&work_tree.join(".git"), &blob);

        let repo = Repository::open(&work_tree, &BufferPool::default()).unwrap();
        assert_eq!(repo.name, "site");
        assert_eq!(repo.objects.len(), 1);
        assert_eq!(repo.refs.resolve_head().unwrap(), blob.id);
    }

    #[test]
    fn test_open_bare_ignores_nested_dot_git() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("site.git");
        let outer = GitObject::blob(b"outer\n".to_vec());
        let inner = GitObject::blob(b"inner\n".to_vec());
        write_git_dir(&bare, &outer);
        write_git_dir(&bare.join(".git"), &inner);

        let repo = Repository::open(&bare, &BufferPool::default()).unwrap();
        assert_eq!(repo.refs.resolve_head().unwrap(), outer.id);
        assert!(!repo.objects.contains(&inner.id));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Repository::open(&dir.path().join("absent"), &BufferPool::default()).is_err());
    }
}

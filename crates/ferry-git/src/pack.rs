//! Git pack file format implementation.
//!
//! Pack files are the format used by git for efficient object transfer.
//! See: https://git-scm.com/docs/pack-format

use crate::{GitError, Result};
use ferry_storage::{BufferPool, GitObject, ObjectId, ObjectStore, ObjectType, PooledBuffer};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Magic bytes at the start of a pack file.
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack file version we support.
const PACK_VERSION: u32 = 2;

/// Default number of compression workers.
pub const DEFAULT_PACK_WORKERS: usize = 10;

/// Writes pack files for a set of objects from a store.
///
/// Objects are stored whole (no deltas). Compression is split across scoped
/// worker threads; entries are written in the order given.
pub struct PackEncoder<'a> {
    store: &'a ObjectStore,
    pool: &'a BufferPool,
}

impl<'a> PackEncoder<'a> {
    /// Creates an encoder reading from `store` and compressing into buffers
    /// from `pool`.
    pub fn new(store: &'a ObjectStore, pool: &'a BufferPool) -> Self {
        Self { store, pool }
    }

    /// Writes a pack of `objects` to `writer` and returns the bytes written.
    pub fn encode<W: Write>(&self, writer: W, objects: &[ObjectId], workers: usize) -> Result<u64> {
        let mut out = HashingWriter::new(writer);

        // Write header
        out.write_all(PACK_SIGNATURE)?;
        out.write_all(&PACK_VERSION.to_be_bytes())?;
        out.write_all(&pack_object_count(objects.len())?.to_be_bytes())?;

        if !objects.is_empty() {
            let workers = workers.clamp(1, objects.len());
            let chunk_size = objects.len().div_ceil(workers);

            let chunks = std::thread::scope(|scope| {
                let handles: Vec<_> = objects
                    .chunks(chunk_size)
                    .map(|chunk| scope.spawn(move || self.compress_chunk(chunk)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(GitError::InvalidPack("compression worker panicked".to_string())))
                    })
                    .collect::<Result<Vec<_>>>()
            })?;

            for chunk in &chunks {
                out.write_all(chunk)?;
            }
        }

        // Append checksum
        let (mut writer, checksum, written) = out.finish();
        writer.write_all(&checksum)?;
        writer.flush()?;

        let total = written + checksum.len() as u64;
        tracing::debug!(objects = objects.len(), workers, bytes = total, "encoded pack");
        Ok(total)
    }

    /// Encodes consecutive entries into one pooled buffer.
    fn compress_chunk(&self, ids: &[ObjectId]) -> Result<PooledBuffer<'a>> {
        let mut buf = self.pool.checkout();
        for id in ids {
            let object = self.store.get(id)?;
            write_entry(&mut buf, &object)?;
        }
        Ok(buf)
    }
}

fn pack_object_count(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| GitError::InvalidPack(format!("too many objects: {}", n)))
}

/// Appends one undeltified pack entry.
fn write_entry(pack: &mut Vec<u8>, object: &GitObject) -> Result<()> {
    let obj_type = object.object_type.pack_type();
    let size = object.data.len();

    // Write type and size in variable-length encoding
    // First byte: (MSB=more bytes) (3 bits type) (4 bits size)
    let mut first_byte = (obj_type << 4) | ((size & 0x0F) as u8);
    let mut remaining_size = size >> 4;

    if remaining_size > 0 {
        first_byte |= 0x80; // More bytes follow
    }
    pack.push(first_byte);

    // Additional size bytes (7 bits each, MSB=continue)
    while remaining_size > 0 {
        let mut byte = (remaining_size & 0x7F) as u8;
        remaining_size >>= 7;
        if remaining_size > 0 {
            byte |= 0x80;
        }
        pack.push(byte);
    }

    // Compress and write data
    let mut encoder = ZlibEncoder::new(pack, Compression::default());
    encoder
        .write_all(&object.data)
        .map_err(|e| GitError::InvalidPack(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| GitError::InvalidPack(e.to_string()))?;

    Ok(())
}

/// Forwards writes while hashing and counting them.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha1,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
            written: 0,
        }
    }

    fn finish(self) -> (W, [u8; 20], u64) {
        let mut checksum = [0u8; 20];
        checksum.copy_from_slice(&self.hasher.finalize());
        (self.inner, checksum, self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Parses a pack file and extracts objects.
///
/// Only undeltified entries are understood, which is what [`PackEncoder`]
/// produces.
pub struct PackParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackParser<'a> {
    /// Creates a new pack parser.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Parses the pack file and stores objects.
    pub fn parse(&mut self, store: &ObjectStore) -> Result<Vec<ObjectId>> {
        // Verify header
        if self.data.len() < 32 {
            return Err(GitError::InvalidPack("pack too small".to_string()));
        }

        if &self.data[0..4] != PACK_SIGNATURE {
            return Err(GitError::InvalidPack("invalid signature".to_string()));
        }

        let version = u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]);
        if version != PACK_VERSION {
            return Err(GitError::InvalidPack(format!(
                "unsupported version: {}",
                version
            )));
        }

        // Verify checksum (last 20 bytes)
        let checksum_start = self.data.len() - 20;
        let mut hasher = Sha1::new();
        hasher.update(&self.data[..checksum_start]);
        let computed = hasher.finalize();

        if computed.as_slice() != &self.data[checksum_start..] {
            return Err(GitError::InvalidPack("checksum mismatch".to_string()));
        }

        let object_count =
            u32::from_be_bytes([self.data[8], self.data[9], self.data[10], self.data[11]]) as usize;

        self.pos = 12;

        // Parse objects
        let mut ids = Vec::new();
        for _ in 0..object_count {
            let id = self.parse_object(store, checksum_start)?;
            ids.push(id);
        }

        if self.pos != checksum_start {
            return Err(GitError::InvalidPack("trailing data after last object".to_string()));
        }

        Ok(ids)
    }

    /// Parses a single object ending before `end`.
    fn parse_object(&mut self, store: &ObjectStore, end: usize) -> Result<ObjectId> {
        if self.pos >= end {
            return Err(GitError::InvalidPack("unexpected end of pack".to_string()));
        }

        // Read type and size
        let first_byte = self.data[self.pos];
        self.pos += 1;

        let obj_type_code = (first_byte >> 4) & 0x07;
        let mut size = (first_byte & 0x0F) as u64;
        let mut shift = 4;

        // Read remaining size bytes
        if first_byte & 0x80 != 0 {
            loop {
                if self.pos >= end {
                    return Err(GitError::InvalidPack("unexpected end in size".to_string()));
                }
                if shift > 57 {
                    return Err(GitError::InvalidPack("object size overflows".to_string()));
                }
                let byte = self.data[self.pos];
                self.pos += 1;
                size |= ((byte & 0x7F) as u64) << shift;
                shift += 7;
                if byte & 0x80 == 0 {
                    break;
                }
            }
        }

        let object_type = ObjectType::from_pack_type(obj_type_code)
            .map_err(|_| GitError::InvalidPack(format!("unsupported entry type: {}", obj_type_code)))?;

        // Decompress data
        let remaining = &self.data[self.pos..end];
        let mut decoder = ZlibDecoder::new(remaining);
        let mut decompressed = Vec::new();
        (&mut decoder)
            .take(size)
            .read_to_end(&mut decompressed)
            .map_err(|e| GitError::InvalidPack(format!("decompression failed: {}", e)))?;
        if decompressed.len() as u64 != size {
            return Err(GitError::InvalidPack(format!(
                "entry is {} bytes, header says {}",
                decompressed.len(),
                size
            )));
        }

        // Drain the end of the zlib stream so total_in covers all of it
        let mut rest = [0u8; 1];
        if decoder
            .read(&mut rest)
            .map_err(|e| GitError::InvalidPack(format!("decompression failed: {}", e)))?
            != 0
        {
            return Err(GitError::InvalidPack("entry larger than its header".to_string()));
        }

        // Update position based on how much was consumed
        self.pos += decoder.total_in() as usize;

        // Create and store object
        let object = GitObject::new(object_type, decompressed);
        let id = object.id;
        store.put(object);

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode(store: &ObjectStore, ids: &[ObjectId], workers: usize) -> Vec<u8> {
        let pool = BufferPool::new(1024, 4);
        let mut pack = Vec::new();
        let written = PackEncoder::new(store, &pool)
            .encode(&mut pack, ids, workers)
            .unwrap();
        assert_eq!(written, pack.len() as u64);
        assert_eq!(pool.borrowed(), 0);
        pack
    }

    fn put_all(store: &ObjectStore, objects: Vec<GitObject>) -> Vec<ObjectId> {
        objects.into_iter().map(|o| store.put(o)).collect()
    }

    #[test]
    fn test_pack_roundtrip() {
        let store = ObjectStore::new();
        let ids = put_all(
            &store,
            vec![
                GitObject::blob(b"Hello, World!".to_vec()),
                GitObject::blob(b"Goodbye, World!".to_vec()),
            ],
        );

        let pack = encode(&store, &ids, 2);

        let store2 = ObjectStore::new();
        let parsed = PackParser::new(&pack).parse(&store2).unwrap();
        assert_eq!(parsed, ids);
        assert_eq!(store2.get(&ids[0]).unwrap().data.as_ref(), b"Hello, World!");
    }

    #[test]
    fn test_pack_empty() {
        let store = ObjectStore::new();
        let pack = encode(&store, &[], 10);

        // Should have header (12 bytes) + checksum (20 bytes)
        assert_eq!(pack.len(), 32);
        assert_eq!(&pack[..12], b"PACK\0\0\0\x02\0\0\0\0");
        assert!(PackParser::new(&pack).parse(&store).unwrap().is_empty());
    }

    #[test]
    fn test_pack_all_object_types() {
        let store = ObjectStore::new();
        let blob = GitObject::blob(b"blob content".to_vec());
        let tree = GitObject::tree(&[("100644", "file", blob.id)]);
        let commit = GitObject::commit(&tree.id, &[], "A <a@x> 0 +0000", "A <a@x> 0 +0000", "msg\n");
        let tag = GitObject::tag(&commit.id, ObjectType::Commit, "v1", "A <a@x> 0 +0000", "tag\n");
        let ids = put_all(&store, vec![blob, tree, commit, tag]);

        let pack = encode(&store, &ids, 3);

        let store2 = ObjectStore::new();
        let parsed = PackParser::new(&pack).parse(&store2).unwrap();
        assert_eq!(parsed, ids);
        assert_eq!(store2.object_type(&ids[3]).unwrap(), ObjectType::Tag);
    }

    #[test]
    fn test_pack_output_independent_of_workers() {
        let store = ObjectStore::new();
        let ids = put_all(
            &store,
            (0..57).map(|i| GitObject::blob(format!("object {}", i).into_bytes())).collect(),
        );

        let single = encode(&store, &ids, 1);
        for workers in [2, 10, 64] {
            assert_eq!(encode(&store, &ids, workers), single);
        }
        assert_eq!(encode(&store, &ids, 0), single);
    }

    #[test]
    fn test_pack_large_object() {
        let store = ObjectStore::new();
        let large_data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 256) as u8).collect();
        let ids = put_all(&store, vec![GitObject::blob(large_data.clone())]);

        let pack = encode(&store, &ids, 10);

        let store2 = ObjectStore::new();
        PackParser::new(&pack).parse(&store2).unwrap();
        assert_eq!(store2.get(&ids[0]).unwrap().data.len(), large_data.len());
    }

    #[test]
    fn test_pack_missing_object() {
        let store = ObjectStore::new();
        let pool = BufferPool::default();
        let missing = ObjectId::from_bytes([9u8; 20]);

        let result = PackEncoder::new(&store, &pool).encode(Vec::new(), &[missing], 4);
        assert!(matches!(result, Err(GitError::Storage(_))));
        assert_eq!(pool.borrowed(), 0);
    }

    #[test]
    fn test_pack_invalid_signature() {
        let mut pack = vec![b'P', b'A', b'C', b'X']; // Wrong signature
        pack.extend_from_slice(&[0, 0, 0, 2]); // Version
        pack.extend_from_slice(&[0, 0, 0, 0]); // Object count
        pack.extend_from_slice(&[0u8; 20]); // Fake checksum

        let store = ObjectStore::new();
        assert!(PackParser::new(&pack).parse(&store).is_err());
    }

    #[test]
    fn test_pack_invalid_version() {
        let mut pack = b"PACK".to_vec();
        pack.extend_from_slice(&[0, 0, 0, 99]); // Invalid version
        pack.extend_from_slice(&[0, 0, 0, 0]); // Object count
        pack.extend_from_slice(&[0u8; 20]); // Fake checksum

        let store = ObjectStore::new();
        assert!(PackParser::new(&pack).parse(&store).is_err());
    }

    #[test]
    fn test_pack_too_small() {
        let pack = vec![0u8; 10]; // Too small for header

        let store = ObjectStore::new();
        assert!(PackParser::new(&pack).parse(&store).is_err());
    }

    #[test]
    fn test_pack_checksum_mismatch() {
        let store = ObjectStore::new();
        let ids = put_all(&store, vec![GitObject::blob(b"test".to_vec())]);
        let mut pack = encode(&store, &ids, 1);

        // Corrupt the checksum
        let len = pack.len();
        pack[len - 1] ^= 0xFF;

        assert!(PackParser::new(&pack).parse(&ObjectStore::new()).is_err());
    }
}

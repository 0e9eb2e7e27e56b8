//! Fuzz target for the client side of an upload-pack exchange.
//!
//! Arbitrary input is decoded as an upload request and have batches, then
//! served in full against a small repository. Nothing may panic.

#![no_main]

use ferry_git::{upload_pack, PktLineReader, UploadHaves, UploadPackOptions, UploadRequest};
use ferry_storage::{BufferPool, GitObject, Repository};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

const SIG: &str = "Fuzz <fuzz@example.com> 0 +0000";

fn repository() -> Repository {
    let repo = Repository::new("fuzz");
    let mut parents = Vec::new();
    for i in 0..4 {
        let blob = repo.objects.put_blob(format!("{}\n", i).into_bytes());
        let tree = repo.objects.put(GitObject::tree(&[("100644", "f", blob)]));
        let commit = repo.objects.put(GitObject::commit(&tree, &parents, SIG, SIG, "c\n"));
        parents = vec![commit];
    }
    if let Some(tip) = parents.first() {
        repo.update_ref("refs/heads/main", *tip);
    }
    repo
}

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(Cursor::new(data));
    if UploadRequest::decode(&mut reader).is_ok() {
        for _ in 0..16 {
            match UploadHaves::decode(&mut reader) {
                Ok(Some(batch)) if !batch.done => continue,
                _ => break,
            }
        }
    }

    let repo = repository();
    let options = UploadPackOptions {
        stateless_rpc: true,
        pack_workers: 2,
        ..Default::default()
    };
    let mut output = Vec::new();
    let _ = upload_pack(&repo, Cursor::new(data), &mut output, &options, &BufferPool::default());
});

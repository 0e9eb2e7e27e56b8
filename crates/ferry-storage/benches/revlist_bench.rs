//! Reachability benchmarks for Ferry.
//!
//! Benchmarks the object walks behind a fetch:
//! - Full closure of a linear history
//! - Incremental fetch against a recent have
//! - Have index construction
//! - Loose-object compression

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ferry_storage::{revlist, GitObject, ObjectId, ObjectStore};
use std::collections::HashSet;
use std::hint::black_box;

const SIG: &str = "Bench <bench@example.com> 0 +0000";

/// Builds a linear history and returns its commits, oldest first.
fn linear_history(store: &ObjectStore, commits: usize) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = Vec::with_capacity(commits);
    for i in 0..commits {
        let blob = store.put_blob(format!("revision {}\n", i).into_bytes());
        let tree = store.put(GitObject::tree(&[("100644", "README", blob)]));
        let parents: Vec<_> = ids.last().copied().into_iter().collect();
        ids.push(store.put(GitObject::commit(&tree, &parents, SIG, SIG, "bench\n")));
    }
    ids
}

fn bench_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("revlist_objects");

    for commits in [100, 1_000, 5_000] {
        let store = ObjectStore::new();
        let history = linear_history(&store, commits);
        let head = history[commits - 1];
        let recent = history[commits - 10];
        let none = HashSet::new();

        group.throughput(Throughput::Elements(commits as u64));

        group.bench_with_input(BenchmarkId::new("clone", commits), &commits, |b, _| {
            b.iter(|| black_box(revlist::objects(&store, &[head], &[], &none).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("incremental", commits), &commits, |b, _| {
            b.iter(|| black_box(revlist::objects(&store, &[head], &[recent], &none).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("with_ref", commits), &commits, |b, _| {
            b.iter(|| black_box(revlist::objects_with_ref(&store, &[head]).unwrap()))
        });
    }

    group.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("loose_compression");

    for size in [1_024, 102_400, 1_048_576] {
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        let obj = GitObject::blob(data);
        let compressed = ObjectStore::compress(&obj).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("compress", size), &size, |b, _| {
            b.iter(|| black_box(ObjectStore::compress(&obj).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decompress", size), &size, |b, _| {
            b.iter(|| black_box(ObjectStore::decompress(&compressed).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_objects, bench_compression);
criterion_main!(benches);

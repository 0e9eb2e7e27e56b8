//! Fetch-path benchmarks for Ferry.
//!
//! - Shallow boundary computation over linear and merge-heavy histories
//! - Pack encoding with one and several workers

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ferry_git::{shallow, PackEncoder, INFINITE_DEPTH};
use ferry_storage::{revlist, BufferPool, GitObject, ObjectId, ObjectStore};
use std::collections::HashSet;
use std::hint::black_box;

const SIG: &str = "Bench <bench@example.com> 0 +0000";

fn commit(store: &ObjectStore, parents: &[ObjectId], i: usize) -> ObjectId {
    let blob = store.put_blob(format!("revision {}\n", i).into_bytes());
    let tree = store.put(GitObject::tree(&[("100644", "README", blob)]));
    store.put(GitObject::commit(&tree, parents, SIG, SIG, "bench\n"))
}

/// Two interleaved branches merged every `every` commits.
fn merge_history(store: &ObjectStore, commits: usize, every: usize) -> ObjectId {
    let mut main = commit(store, &[], 0);
    let mut side = main;
    for i in 1..commits {
        if i % every == 0 {
            main = commit(store, &[main, side], i);
            side = main;
        } else if i % 2 == 0 {
            main = commit(store, &[main], i);
        } else {
            side = commit(store, &[side], i);
        }
    }
    main
}

fn bench_shallow(c: &mut Criterion) {
    let mut group = c.benchmark_group("shallow_compute");

    for commits in [100, 1_000, 5_000] {
        let store = ObjectStore::new();
        let head = merge_history(&store, commits, 8);

        group.throughput(Throughput::Elements(commits as u64));

        group.bench_with_input(BenchmarkId::new("depth_50", commits), &commits, |b, _| {
            b.iter(|| black_box(shallow::compute(&store, &[head], 50).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("unshallow", commits), &commits, |b, _| {
            b.iter(|| black_box(shallow::compute(&store, &[head], INFINITE_DEPTH).unwrap()))
        });
    }

    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_encode");

    let store = ObjectStore::new();
    let head = merge_history(&store, 2_000, 8);
    let objects = revlist::objects(&store, &[head], &[], &HashSet::new()).unwrap();
    let pool = BufferPool::default();

    group.throughput(Throughput::Elements(objects.len() as u64));
    for workers in [1, 4, 10] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let mut out = Vec::new();
                let written = PackEncoder::new(&store, &pool).encode(&mut out, &objects, workers).unwrap();
                black_box(written)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_shallow, bench_pack);
criterion_main!(benches);

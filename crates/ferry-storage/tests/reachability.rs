//! Loading an on-disk repository and walking it.

use ferry_storage::{revlist, BufferPool, GitObject, ObjectId, ObjectStore, Repository};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::Path;

const SIG: &str = "Alice <alice@example.com> 1700000000 +0000";

/// Writes `object` as a loose object under `git_dir/objects`.
fn write_loose(git_dir: &Path, object: &GitObject) -> ObjectId {
    let hex = object.id.to_hex();
    let fanout = git_dir.join("objects").join(&hex[..2]);
    std::fs::create_dir_all(&fanout).unwrap();
    std::fs::write(fanout.join(&hex[2..]), ObjectStore::compress(object).unwrap()).unwrap();
    object.id
}

#[test]
fn test_open_repository_and_resolve_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let git_dir = dir.path().join("project.git");
    std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
    std::fs::create_dir_all(git_dir.join("objects/pack")).unwrap();

    let readme = write_loose(&git_dir, &GitObject::blob(b"# project\n".to_vec()));
    let tree1 = write_loose(&git_dir, &GitObject::tree(&[("100644", "README.md", readme)]));
    let first = write_loose(&git_dir, &GitObject::commit(&tree1, &[], SIG, SIG, "first\n"));

    let main_rs = write_loose(&git_dir, &GitObject::blob(b"fn main() {}\n".to_vec()));
    let tree2 = write_loose(
        &git_dir,
        &GitObject::tree(&[("100644", "README.md", readme), ("100644", "main.rs", main_rs)]),
    );
    let second = write_loose(&git_dir, &GitObject::commit(&tree2, &[first], SIG, SIG, "second\n"));

    std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    std::fs::write(git_dir.join("refs/heads/main"), format!("{}\n", second)).unwrap();

    let pool = BufferPool::new(64, 4);
    let repo = Repository::open(&git_dir, &pool).unwrap();

    assert_eq!(repo.name, "project.git");
    assert_eq!(repo.objects.len(), 6);
    assert_eq!(repo.refs.resolve_head().unwrap(), second);
    assert_eq!(pool.borrowed(), 0);

    let full = revlist::objects(&repo.objects, &[second], &[], &HashSet::new()).unwrap();
    assert_eq!(full.len(), 6);

    let mut incremental = revlist::objects(&repo.objects, &[second], &[first], &HashSet::new()).unwrap();
    incremental.sort();
    let mut expected = vec![second, tree2, main_rs];
    expected.sort();
    assert_eq!(incremental, expected);
}

#[test]
fn test_open_missing_objects_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Repository::open(dir.path(), &BufferPool::default()).is_err());
}

/// Builds a random DAG: commit `i` takes parents from the listed earlier
/// indices. Returns commit ids by index.
fn build_dag(store: &ObjectStore, parents: &[Vec<usize>]) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = Vec::new();
    for (i, ps) in parents.iter().enumerate() {
        let blob = store.put_blob(format!("{}\n", i).into_bytes());
        let tree = store.put(GitObject::tree(&[("100644", "f", blob)]));
        let mut parent_ids: Vec<ObjectId> = ps.iter().filter(|&&p| p < i).map(|&p| ids[p]).collect();
        parent_ids.dedup();
        ids.push(store.put(GitObject::commit(&tree, &parent_ids, SIG, SIG, "c\n")));
    }
    ids
}

fn closure(store: &ObjectStore, roots: &[ObjectId]) -> HashSet<ObjectId> {
    revlist::objects(store, roots, &[], &HashSet::new())
        .unwrap()
        .into_iter()
        .collect()
}

fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..30, 0..3), 1..30)
}

proptest! {
    #[test]
    fn prop_objects_is_set_difference(dag in dag_strategy(), want in 0usize..30, have in 0usize..30) {
        let store = ObjectStore::new();
        let ids = build_dag(&store, &dag);
        let want = ids[want % ids.len()];
        let have = ids[have % ids.len()];

        let result = revlist::objects(&store, &[want], &[have], &HashSet::new()).unwrap();
        let result_set: HashSet<_> = result.iter().copied().collect();
        prop_assert_eq!(result.len(), result_set.len());

        let wanted = closure(&store, &[want]);
        let had = closure(&store, &[have]);
        let expected: HashSet<_> = wanted.difference(&had).copied().collect();
        prop_assert_eq!(result_set, expected);
    }

    #[test]
    fn prop_objects_with_ref_matches_closure(dag in dag_strategy(), want in 0usize..30) {
        let store = ObjectStore::new();
        let ids = build_dag(&store, &dag);
        let want = ids[want % ids.len()];

        let index = revlist::objects_with_ref(&store, &[want]).unwrap();
        let keys: HashSet<_> = index.keys().copied().collect();
        prop_assert_eq!(keys, closure(&store, &[want]));
        prop_assert!(index.values().all(|refs| refs == &vec![want]));
    }
}

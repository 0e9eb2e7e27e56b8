//! Reachability over the object graph.
//!
//! Both walks are iterative: pending objects live on an explicit stack and
//! every object is expanded at most once per walk.

use crate::{Commit, ObjectId, ObjectStore, ObjectType, Result, StorageError, Tag, Tree};
use std::collections::{HashMap, HashSet};

/// Returns every object reachable from `wants` that is not reachable from
/// `haves`, in walk order.
///
/// Haves the store does not know are ignored. Parents of commits listed in
/// `shallow_boundary` are not followed.
pub fn objects(
    store: &ObjectStore,
    wants: &[ObjectId],
    haves: &[ObjectId],
    shallow_boundary: &HashSet<ObjectId>,
) -> Result<Vec<ObjectId>> {
    let mut seen = HashSet::new();
    let mut walk = Walk {
        store,
        seen: &mut seen,
        shallow: None,
    };
    walk.run(haves, Missing::Skip, |_| {})?;

    let mut result = Vec::new();
    let mut walk = Walk {
        store,
        seen: &mut seen,
        shallow: Some(shallow_boundary),
    };
    walk.run(wants, Missing::Fail, |id| result.push(id))?;

    tracing::debug!(
        wants = wants.len(),
        haves = haves.len(),
        objects = result.len(),
        "resolved objects"
    );
    Ok(result)
}

/// Maps every object reachable from each want to the wants it is reachable
/// from.
pub fn objects_with_ref(
    store: &ObjectStore,
    wants: &[ObjectId],
) -> Result<HashMap<ObjectId, Vec<ObjectId>>> {
    let mut index: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();

    for want in wants {
        let mut seen = HashSet::new();
        let mut walk = Walk {
            store,
            seen: &mut seen,
            shallow: None,
        };
        walk.run(std::slice::from_ref(want), Missing::Fail, |id| {
            let refs = index.entry(id).or_default();
            if !refs.contains(want) {
                refs.push(*want);
            }
        })?;
    }

    Ok(index)
}

/// How to treat a root the store does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    Skip,
    Fail,
}

struct Walk<'a> {
    store: &'a ObjectStore,
    seen: &'a mut HashSet<ObjectId>,
    shallow: Option<&'a HashSet<ObjectId>>,
}

impl Walk<'_> {
    fn run(
        &mut self,
        roots: &[ObjectId],
        missing: Missing,
        mut emit: impl FnMut(ObjectId),
    ) -> Result<()> {
        // (id, is_root)
        let mut stack: Vec<(ObjectId, bool)> = roots.iter().rev().map(|id| (*id, true)).collect();

        while let Some((id, is_root)) = stack.pop() {
            if self.seen.contains(&id) {
                continue;
            }

            let object = match self.store.get(&id) {
                Ok(object) => object,
                Err(StorageError::ObjectNotFound(_)) if is_root && missing == Missing::Skip => {
                    tracing::debug!(%id, "ignoring unknown root");
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.seen.insert(id);
            emit(id);

            match object.object_type {
                ObjectType::Commit => {
                    let commit = Commit::decode(&object)?;
                    let boundary = self.shallow.is_some_and(|s| s.contains(&id));
                    if !boundary {
                        let parents: Vec<_> = commit.parents().collect();
                        stack.extend(parents.into_iter().rev().map(|p| (p, false)));
                    }
                    stack.push((commit.tree, false));
                }
                ObjectType::Tree => {
                    let tree = Tree::decode(&object)?;
                    stack.extend(
                        tree.entries
                            .iter()
                            .rev()
                            .filter(|entry| !entry.is_gitlink())
                            .map(|entry| (entry.id, false)),
                    );
                }
                ObjectType::Tag => {
                    let tag = Tag::decode(&object)?;
                    stack.push((tag.target, false));
                }
                ObjectType::Blob => {}
            }
        }

        Ok(())
    }
}

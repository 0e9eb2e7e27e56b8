//! Shallow boundary computation for `deepen <n>` requests.
//!
//! Starting from each want, commits closer than `depth` to the want are
//! unshallow and their parents are walked; a commit at distance `depth` or
//! more is a shallow boundary commit and its parents are not walked.
//!
//! The walk is depth-first. When a commit has several parents to walk, the
//! last one is continued inline and the others wait on an explicit stack,
//! so the stack grows with the number of open branches and not with the
//! length of history. Distances are remembered across heads: a parent
//! already reached at the same or a smaller distance is not walked again,
//! and one reached later by a shorter path is walked again from there.

use crate::response::ShallowUpdate;
use crate::Result;
use ferry_storage::{Commit, ObjectId, ObjectStore};
use std::collections::{HashMap, HashSet};

/// The depth `git fetch --unshallow` asks for. Disables shallow marking.
pub const INFINITE_DEPTH: u32 = 0x7fff_ffff;

/// Computes the shallow update for `heads` at the given depth.
///
/// Heads the store does not have, or that are not commits, are skipped.
/// A missing or undecodable parent is an error.
pub fn compute(store: &ObjectStore, heads: &[ObjectId], depth: u32) -> Result<ShallowUpdate> {
    let mut depths: HashMap<ObjectId, u32> = HashMap::new();
    let mut lists = Boundary::default();
    let mut stack: Vec<(ObjectId, u32)> = Vec::new();

    for head in heads {
        if depths.get(head) == Some(&0) {
            continue;
        }

        let commit = match Commit::lookup(store, head) {
            Ok(commit) => commit,
            Err(e) => {
                tracing::debug!(%head, error = %e, "skipping shallow head");
                continue;
            }
        };
        depths.insert(*head, 0);
        let mut inline = Some((commit, 0));

        loop {
            let (commit, distance) = match inline.take() {
                Some(next) => next,
                None => match stack.pop() {
                    // Reached again by a shorter path since it was pushed.
                    Some((id, distance)) if depths.get(&id).is_some_and(|&d| d < distance) => continue,
                    Some((id, distance)) => (Commit::lookup(store, &id)?, distance),
                    None => break,
                },
            };

            if depth != INFINITE_DEPTH && distance >= depth {
                lists.mark_shallow(commit.id);
                continue;
            }
            lists.mark_unshallow(commit.id);

            let next = distance + 1;
            let mut pending: Vec<ObjectId> = Vec::new();
            for parent in commit.parents() {
                if depths.get(&parent).is_some_and(|&d| d <= next) {
                    continue;
                }
                depths.insert(parent, next);
                pending.push(parent);
            }

            if let Some(last) = pending.pop() {
                stack.extend(pending.into_iter().map(|parent| (parent, next)));
                inline = Some((Commit::lookup(store, &last)?, next));
            }
        }
    }

    let update = lists.into_update();
    tracing::debug!(
        heads = heads.len(),
        depth,
        shallows = update.shallows.len(),
        unshallows = update.unshallows.len(),
        "computed shallow boundary"
    );
    Ok(update)
}

/// Ordered shallow and unshallow sets.
#[derive(Default)]
struct Boundary {
    shallows: Vec<ObjectId>,
    unshallows: Vec<ObjectId>,
    shallow_set: HashSet<ObjectId>,
    unshallow_set: HashSet<ObjectId>,
}

impl Boundary {
    fn mark_shallow(&mut self, id: ObjectId) {
        if !self.unshallow_set.contains(&id) && self.shallow_set.insert(id) {
            self.shallows.push(id);
        }
    }

    fn mark_unshallow(&mut self, id: ObjectId) {
        if self.shallow_set.remove(&id) {
            self.shallows.retain(|s| *s != id);
        }
        if self.unshallow_set.insert(id) {
            self.unshallows.push(id);
        }
    }

    fn into_update(self) -> ShallowUpdate {
        ShallowUpdate {
            shallows: self.shallows,
            unshallows: self.unshallows,
        }
    }
}

//! Git reference management.

use crate::{ObjectId, Result, StorageError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;

/// Maximum number of symbolic hops followed before giving up.
const MAX_SYMREF_DEPTH: usize = 5;

/// A git reference (branch, tag, or symbolic ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl Reference {
    /// Resolves a symbolic reference to a direct object ID.
    pub fn resolve(&self, store: &RefStore) -> Result<ObjectId> {
        let mut current = self.clone();
        for _ in 0..MAX_SYMREF_DEPTH {
            match current {
                Self::Direct(id) => return Ok(id),
                Self::Symbolic(target) => current = store.get(&target)?,
            }
        }
        Err(StorageError::InvalidRef(
            "symbolic reference chain too deep".to_string(),
        ))
    }

    /// Parses the contents of a loose ref file.
    fn parse(contents: &str) -> Result<Self> {
        let contents = contents.trim();
        match contents.strip_prefix("ref:") {
            Some(target) => Ok(Self::Symbolic(target.trim().to_string())),
            None => ObjectId::from_hex(contents)
                .map(Self::Direct)
                .map_err(|_| StorageError::InvalidRef(contents.to_string())),
        }
    }
}

/// Thread-safe reference store, ordered by ref name.
#[derive(Debug, Default)]
pub struct RefStore {
    refs: RwLock<BTreeMap<String, Reference>>,
}

impl RefStore {
    /// Creates a new empty reference store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `HEAD`, `packed-refs` and every loose ref under `refs/` from a
    /// git directory. Loose refs take precedence over packed ones.
    pub fn load(git_dir: &Path) -> Result<Self> {
        let store = Self::new();

        let packed = git_dir.join("packed-refs");
        if packed.is_file() {
            store.load_packed(&std::fs::read_to_string(&packed)?)?;
        }

        let refs_dir = git_dir.join("refs");
        if refs_dir.is_dir() {
            store.load_loose_dir(&refs_dir, "refs")?;
        }

        let head = git_dir.join("HEAD");
        if head.is_file() {
            let reference = Reference::parse(&std::fs::read_to_string(&head)?)?;
            store.refs.write().insert("HEAD".to_string(), reference);
        }

        tracing::debug!(git_dir = %git_dir.display(), refs = store.refs.read().len(), "loaded refs");
        Ok(store)
    }

    fn load_packed(&self, contents: &str) -> Result<()> {
        let mut refs = self.refs.write();
        for line in contents.lines() {
            // Comments carry the file's traits; peeled lines are recomputed
            // from the object store when needed.
            if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            let (hex, name) = line
                .split_once(' ')
                .ok_or_else(|| StorageError::InvalidRef(line.to_string()))?;
            let id = ObjectId::from_hex(hex).map_err(|_| StorageError::InvalidRef(line.to_string()))?;
            refs.insert(name.to_string(), Reference::Direct(id));
        }
        Ok(())
    }

    fn load_loose_dir(&self, dir: &Path, prefix: &str) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
            if entry.file_type()?.is_dir() {
                self.load_loose_dir(&entry.path(), &name)?;
            } else {
                let reference = Reference::parse(&std::fs::read_to_string(entry.path())?)?;
                self.refs.write().insert(name, reference);
            }
        }
        Ok(())
    }

    /// Gets a reference by name.
    pub fn get(&self, name: &str) -> Result<Reference> {
        self.refs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::RefNotFound(name.to_string()))
    }

    /// Sets a reference to point to an object.
    pub fn set(&self, name: &str, target: ObjectId) {
        self.refs
            .write()
            .insert(name.to_string(), Reference::Direct(target));
    }

    /// Sets a symbolic reference.
    pub fn set_symbolic(&self, name: &str, target: &str) {
        self.refs
            .write()
            .insert(name.to_string(), Reference::Symbolic(target.to_string()));
    }

    /// Lists all references with a given prefix, sorted by name.
    pub fn list(&self, prefix: &str) -> Vec<(String, Reference)> {
        self.refs
            .read()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, refr)| (name.clone(), refr.clone()))
            .collect()
    }

    /// Resolves HEAD to the commit it ultimately names.
    pub fn resolve_head(&self) -> Result<ObjectId> {
        self.get("HEAD")?.resolve(self)
    }

    /// Returns the ref HEAD points at, if HEAD is symbolic.
    pub fn head_target(&self) -> Option<String> {
        match self.get("HEAD").ok()? {
            Reference::Symbolic(target) => Some(target),
            Reference::Direct(_) => None,
        }
    }
}

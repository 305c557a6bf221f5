//! Secondary indices over the live entity set.
//!
//! The store is derived, non-owning state: every view is updated in lockstep
//! with entity construction, destruction, rename, and reparent. A global
//! index is paired with nested per-root indices so collaborators can scope
//! queries to one subtree (world, local, server, prefabs).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::entity::{EntityId, EntityRef};
use crate::error::SceneError;
use crate::kind::EntityKind;

/// The named root subtrees of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SceneRoot {
    /// Replicated game world.
    World,
    /// Client-local entities, never replicated.
    Local,
    /// Server-only entities, never sent to clients.
    Server,
    /// Inert templates; never promoted to the tick loop.
    Prefabs,
}

impl SceneRoot {
    /// Every root, in tick order.
    pub const ALL: [SceneRoot; 4] = [
        SceneRoot::World,
        SceneRoot::Local,
        SceneRoot::Server,
        SceneRoot::Prefabs,
    ];

    /// The root entity's name, which prefixes every path in its subtree.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SceneRoot::World => "world",
            SceneRoot::Local => "local",
            SceneRoot::Server => "server",
            SceneRoot::Prefabs => "prefabs",
        }
    }
}

/// One lookup view: path, ref, and kind indices over a set of entities.
#[derive(Debug, Default)]
pub struct EntityIndex {
    paths: HashMap<String, EntityId>,
    refs: HashMap<EntityRef, EntityId>,
    kinds: HashMap<EntityKind, BTreeSet<EntityId>>,
}

impl EntityIndex {
    fn insert(&mut self, id: EntityId, path: &str, entity_ref: EntityRef, kind: EntityKind) {
        self.paths.insert(path.to_string(), id);
        self.refs.insert(entity_ref, id);
        self.kinds.entry(kind).or_default().insert(id);
    }

    fn remove(&mut self, id: EntityId, path: &str, entity_ref: EntityRef, kind: EntityKind) {
        self.paths.remove(path);
        self.refs.remove(&entity_ref);
        if let Some(set) = self.kinds.get_mut(&kind) {
            set.remove(&id);
            // Drop emptied sets so the map does not grow over churn.
            if set.is_empty() {
                self.kinds.remove(&kind);
            }
        }
    }

    fn repath(&mut self, id: EntityId, old_path: &str, new_path: &str) {
        self.paths.remove(old_path);
        self.paths.insert(new_path.to_string(), id);
    }

    /// Look up an entity by its full dotted path. O(1).
    #[must_use]
    pub fn by_path(&self, path: &str) -> Option<EntityId> {
        self.paths.get(path).copied()
    }

    /// Look up an entity by its stable ref. O(1).
    #[must_use]
    pub fn by_ref(&self, entity_ref: EntityRef) -> Option<EntityId> {
        self.refs.get(&entity_ref).copied()
    }

    /// All live entities whose kind is `kind` or a subtype of it, in id
    /// order.
    #[must_use]
    pub fn of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        let mut out = BTreeSet::new();
        for candidate in EntityKind::ALL {
            if candidate.is_subtype_of(kind)
                && let Some(set) = self.kinds.get(&candidate)
            {
                out.extend(set.iter().copied());
            }
        }
        out.into_iter().collect()
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Global index plus nested per-root indices.
#[derive(Debug)]
pub struct EntityStore {
    all: EntityIndex,
    roots: BTreeMap<SceneRoot, EntityIndex>,
}

impl EntityStore {
    /// Create an empty store with one nested index per scene root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            all: EntityIndex::default(),
            roots: SceneRoot::ALL
                .into_iter()
                .map(|r| (r, EntityIndex::default()))
                .collect(),
        }
    }

    /// Index an entity under its root.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateRef`] if the ref is already indexed —
    /// a ref collision bug that must abort loudly, never overwrite.
    pub fn register(
        &mut self,
        root: SceneRoot,
        id: EntityId,
        path: &str,
        entity_ref: EntityRef,
        kind: EntityKind,
    ) -> Result<(), SceneError> {
        if self.all.refs.contains_key(&entity_ref) {
            return Err(SceneError::DuplicateRef(entity_ref));
        }
        self.all.insert(id, path, entity_ref, kind);
        if let Some(index) = self.roots.get_mut(&root) {
            index.insert(id, path, entity_ref, kind);
        }
        Ok(())
    }

    /// Drop an entity from the global and root views.
    pub fn unregister(
        &mut self,
        root: SceneRoot,
        id: EntityId,
        path: &str,
        entity_ref: EntityRef,
        kind: EntityKind,
    ) {
        self.all.remove(id, path, entity_ref, kind);
        if let Some(index) = self.roots.get_mut(&root) {
            index.remove(id, path, entity_ref, kind);
        }
    }

    /// Update the path key after a rename or reparent within the same root.
    pub fn repath(&mut self, root: SceneRoot, id: EntityId, old_path: &str, new_path: &str) {
        self.all.repath(id, old_path, new_path);
        if let Some(index) = self.roots.get_mut(&root) {
            index.repath(id, old_path, new_path);
        }
    }

    /// The global view.
    #[must_use]
    pub fn all(&self) -> &EntityIndex {
        &self.all
    }

    /// The nested view for one root subtree.
    #[must_use]
    pub fn root(&self, root: SceneRoot) -> &EntityIndex {
        &self.roots[&root]
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

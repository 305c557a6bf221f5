//! The scene graph.
//!
//! A [`Scene`] owns every entity in one game instance. Entities live in an
//! arena keyed by [`EntityId`]; parent and child links are id lookups, so the
//! tree has no reference cycles and a stale id fails lookup instead of
//! dangling. All mutation is synchronous and single-threaded, driven by an
//! external game loop through [`Scene::pre_tick`], [`Scene::tick`], and
//! [`Scene::interpolate`].
//!
//! Signals are queued during an operation and dispatched only after the tree
//! is consistent again, never mid-computation.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::mem;

use anyhow::Result;
use glam::Vec2;
use tracing::{error, warn};

use engine_math::{Transform, local_to_world, point_world_to_local, world_to_local};
use engine_signal::{ListenerHandle, SignalOn, SignalRouter};
use engine_value::{Acceptance, ValueError, ValueRegistry, WriterSource, resolve};

use crate::authority::AuthorityMutation;
use crate::behavior::{Behavior, TickContext};
use crate::definition::EntityDefinition;
use crate::entity::{EntityAllocator, EntityId, EntityRef};
use crate::error::SceneError;
use crate::kind::EntityKind;
use crate::naming::deduplicate_name;
use crate::resources::ResourceResolver;
use crate::signals::{
    ChildDestroyed, ChildRenamed, ChildReparented, DescendantDestroyed, DescendantRenamed,
    DescendantReparented, EntityDestroyed, EntityRenamed, EntityReparented, EntityScope,
    EntitySpawned, EntityTransformUpdate, SceneScope,
};
use crate::store::{EntityStore, SceneRoot};

/// Hierarchy depth past which recursive propagation risks the stack.
const DEPTH_WARN_LIMIT: u16 = 255;

/// Per-entity lifecycle state.
///
/// `Constructed → Spawned` fires once, lazily, on the first pre-tick after
/// construction. `Destroyed` is terminal; destroyed nodes leave the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built from a definition, not yet participating in ticks.
    Constructed,
    /// Initialised and ticking.
    Spawned,
    /// Torn down. Terminal.
    Destroyed,
}

/// One entity's storage in the arena.
struct EntityNode {
    name: String,
    path: String,
    entity_ref: EntityRef,
    kind: EntityKind,
    root: SceneRoot,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    depth: u16,
    state: LifecycleState,
    transform: Transform,
    global_transform: Transform,
    bounds: Option<Vec2>,
    /// `(key, value id)` pairs for cells owned by this entity.
    values: Vec<(String, String)>,
    behaviors: Vec<Box<dyn Behavior>>,
    router: SignalRouter<EntityScope>,
    /// Handles this entity registered on other entities; revoked on destroy.
    subscriptions: Vec<(EntityId, ListenerHandle)>,
    authority: Option<WriterSource>,
    authority_clock: u32,
    authority_source: WriterSource,
}

/// Where a queued signal is delivered.
enum SignalTarget {
    Entity(EntityId),
    Scene,
}

/// A signal captured during a mutation, dispatched once the tree settles.
struct QueuedSignal {
    target: SignalTarget,
    type_id: TypeId,
    payload: Box<dyn Any>,
}

fn queue_entity<S: SignalOn<EntityScope>>(queue: &mut Vec<QueuedSignal>, target: EntityId, signal: S) {
    queue.push(QueuedSignal {
        target: SignalTarget::Entity(target),
        type_id: TypeId::of::<S>(),
        payload: Box::new(signal),
    });
}

fn queue_scene<S: SignalOn<SceneScope>>(queue: &mut Vec<QueuedSignal>, signal: S) {
    queue.push(QueuedSignal {
        target: SignalTarget::Scene,
        type_id: TypeId::of::<S>(),
        payload: Box::new(signal),
    });
}

/// Tick phases, for dispatch and logging.
#[derive(Debug, Clone, Copy)]
enum Phase {
    PreTick,
    Tick,
    Interpolate,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::PreTick => "pre_tick",
            Phase::Tick => "tick",
            Phase::Interpolate => "interpolate",
        }
    }
}

/// The entity tree of one game instance.
pub struct Scene {
    allocator: EntityAllocator,
    nodes: HashMap<EntityId, EntityNode>,
    store: EntityStore,
    values: ValueRegistry,
    roots: BTreeMap<SceneRoot, EntityId>,
    router: SignalRouter<SceneScope>,
    resolver: Option<Box<dyn ResourceResolver>>,
    tick_id: u64,
}

impl Scene {
    /// Create a scene whose locally originated writes are stamped with
    /// `source`. The four named roots are constructed immediately and are
    /// permanent.
    #[must_use]
    pub fn new(source: WriterSource) -> Self {
        let mut scene = Self {
            allocator: EntityAllocator::new(),
            nodes: HashMap::new(),
            store: EntityStore::new(),
            values: ValueRegistry::new(source.clone()),
            roots: BTreeMap::new(),
            router: SignalRouter::new(),
            resolver: None,
            tick_id: 0,
        };
        for root in SceneRoot::ALL {
            let id = scene.allocator.allocate();
            let entity_ref = EntityRef::generate();
            scene.nodes.insert(
                id,
                EntityNode {
                    name: root.as_str().to_string(),
                    path: root.as_str().to_string(),
                    entity_ref,
                    kind: EntityKind::Empty,
                    root,
                    parent: None,
                    children: Vec::new(),
                    depth: 0,
                    state: LifecycleState::Spawned,
                    transform: Transform::IDENTITY,
                    global_transform: Transform::IDENTITY,
                    bounds: None,
                    values: Vec::new(),
                    behaviors: Vec::new(),
                    router: SignalRouter::new(),
                    subscriptions: Vec::new(),
                    authority: None,
                    authority_clock: 0,
                    authority_source: source.clone(),
                },
            );
            scene
                .store
                .register(root, id, root.as_str(), entity_ref, EntityKind::Empty)
                .expect("fresh root ref collided in an empty store");
            scene.roots.insert(root, id);
        }
        scene
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    /// The entity id of a named root.
    #[must_use]
    pub fn root(&self, root: SceneRoot) -> EntityId {
        self.roots[&root]
    }

    /// The lookup indices.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The replicated-value registry of this game instance.
    #[must_use]
    pub fn values(&self) -> &ValueRegistry {
        &self.values
    }

    /// Mutable access to the value registry.
    pub fn values_mut(&mut self) -> &mut ValueRegistry {
        &mut self.values
    }

    /// Number of live entities, roots included.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    /// The current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// An entity's current name.
    pub fn name(&self, entity: EntityId) -> Result<&str, SceneError> {
        Ok(&self.node(entity)?.name)
    }

    /// An entity's dotted path id. Recomputed on every rename and reparent.
    pub fn path(&self, entity: EntityId) -> Result<&str, SceneError> {
        Ok(&self.node(entity)?.path)
    }

    /// An entity's stable ref.
    pub fn entity_ref(&self, entity: EntityId) -> Result<EntityRef, SceneError> {
        Ok(self.node(entity)?.entity_ref)
    }

    /// An entity's kind tag.
    pub fn kind(&self, entity: EntityId) -> Result<EntityKind, SceneError> {
        Ok(self.node(entity)?.kind)
    }

    /// An entity's parent, `None` for roots.
    pub fn parent(&self, entity: EntityId) -> Result<Option<EntityId>, SceneError> {
        Ok(self.node(entity)?.parent)
    }

    /// An entity's children in insertion order.
    pub fn children(&self, entity: EntityId) -> Result<&[EntityId], SceneError> {
        Ok(&self.node(entity)?.children)
    }

    /// An entity's lifecycle state.
    pub fn state(&self, entity: EntityId) -> Result<LifecycleState, SceneError> {
        Ok(self.node(entity)?.state)
    }

    /// An entity's hierarchy depth (roots are 0).
    pub fn depth(&self, entity: EntityId) -> Result<u16, SceneError> {
        Ok(self.node(entity)?.depth)
    }

    /// Look up a direct child by name.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ChildNotFound`] if no child has that name —
    /// this accessor is for names the caller knows exist.
    pub fn get_child(&self, parent: EntityId, name: &str) -> Result<EntityId, SceneError> {
        let parent_node = self.node(parent)?;
        self.child_by_name(parent, name)
            .ok_or_else(|| SceneError::ChildNotFound {
                parent: parent_node.path.clone(),
                name: name.to_string(),
            })
    }

    /// Check an entity against a kind, subtype-inclusively.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::KindMismatch`] if the entity's kind is not
    /// `kind` or a subtype of it.
    pub fn expect_kind(&self, entity: EntityId, kind: EntityKind) -> Result<EntityId, SceneError> {
        let node = self.node(entity)?;
        if node.kind.is_subtype_of(kind) {
            Ok(entity)
        } else {
            Err(SceneError::KindMismatch {
                path: node.path.clone(),
                expected: kind,
                actual: node.kind,
            })
        }
    }

    /// Install the asset-URI resolver provided by the host.
    pub fn set_resource_resolver(&mut self, resolver: Box<dyn ResourceResolver>) {
        self.resolver = Some(resolver);
    }

    /// Map a `res://` / `cloud://` URI through the installed resolver.
    ///
    /// # Errors
    ///
    /// Fails if no resolver is installed or the resolver rejects the URI.
    pub fn resolve_resource(&self, uri: &str) -> Result<String> {
        match &self.resolver {
            Some(resolver) => resolver.resolve_resource(uri),
            None => Err(anyhow::anyhow!("no resource resolver installed")),
        }
    }

    // ── Construction ────────────────────────────────────────────────────────

    /// Construct an entity (and its declared subtree) under `parent`.
    ///
    /// Parents are always fully constructed before their children. The new
    /// entities start [`LifecycleState::Constructed`] and are promoted on
    /// the next pre-tick.
    ///
    /// # Errors
    ///
    /// Structural errors ([`SceneError::EntityNotFound`],
    /// [`SceneError::DuplicateRef`], value registration failures) abort the
    /// spawn and unwind every entity it already constructed, leaving the
    /// rest of the tree untouched.
    pub fn spawn(
        &mut self,
        parent: EntityId,
        definition: EntityDefinition,
    ) -> Result<EntityId, SceneError> {
        self.node(parent)?;
        self.spawn_inner(parent, definition)
    }

    fn spawn_inner(
        &mut self,
        parent: EntityId,
        definition: EntityDefinition,
    ) -> Result<EntityId, SceneError> {
        let EntityDefinition {
            kind,
            name,
            transform,
            values,
            behaviors,
            children,
            bounds,
        } = definition;

        let (root, depth, parent_path, parent_global) = {
            let p = self.node(parent)?;
            (p.root, p.depth + 1, p.path.clone(), p.global_transform)
        };
        let name = deduplicate_name(&name, |candidate| {
            self.child_by_name(parent, candidate).is_some()
        });
        let path = format!("{parent_path}.{name}");
        if depth > DEPTH_WARN_LIMIT {
            warn!(%path, depth, "hierarchy depth exceeds recursion safety limit");
        }

        let id = self.allocator.allocate();
        let entity_ref = EntityRef::generate();
        let source = self.values.source().clone();
        self.nodes.insert(
            id,
            EntityNode {
                name,
                path: path.clone(),
                entity_ref,
                kind,
                root,
                parent: Some(parent),
                children: Vec::new(),
                depth,
                state: LifecycleState::Constructed,
                transform,
                global_transform: local_to_world(&parent_global, &transform),
                bounds,
                values: Vec::new(),
                behaviors,
                router: SignalRouter::new(),
                subscriptions: Vec::new(),
                authority: None,
                authority_clock: 0,
                authority_source: source,
            },
        );

        if let Err(err) = self.store.register(root, id, &path, entity_ref, kind) {
            // Ref collision: abort loudly and roll back the half-built node.
            self.nodes.remove(&id);
            return Err(err);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }

        for (key, initial) in values {
            if let Err(err) = self.declare_value(id, &key, initial) {
                self.unwind_construction(id);
                return Err(err);
            }
        }
        for child in children {
            if let Err(err) = self.spawn_inner(id, child) {
                self.unwind_construction(id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Tear down a half-built subtree after a failed construction.
    ///
    /// Nothing in the subtree has been promoted and no signals have fired
    /// for it, so teardown is pure bookkeeping: nodes, indices, value cells.
    fn unwind_construction(&mut self, id: EntityId) {
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.retain(|&c| c != id);
        }
        for n in self.collect_subtree(id) {
            if let Some(node) = self.nodes.remove(&n) {
                self.store
                    .unregister(node.root, n, &node.path, node.entity_ref, node.kind);
                for (_, value_id) in &node.values {
                    self.values.destroy(value_id);
                }
            }
        }
    }

    /// Register a replicated value cell owned by `entity`.
    ///
    /// The cell id is `"<ref>/<key>"`, stable across renames and reparents.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity or a duplicate key.
    pub fn declare_value(
        &mut self,
        entity: EntityId,
        key: &str,
        initial: serde_json::Value,
    ) -> Result<String, SceneError> {
        let entity_ref = self.node(entity)?.entity_ref;
        let value_id = format!("{entity_ref}/{key}");
        self.values.register(value_id.clone(), initial)?;
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.values.push((key.to_string(), value_id.clone()));
        }
        Ok(value_id)
    }

    /// The registry id of a value declared on `entity`.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity or an undeclared key.
    pub fn value_id(&self, entity: EntityId, key: &str) -> Result<String, SceneError> {
        let node = self.node(entity)?;
        node.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                SceneError::Value(ValueError::UnknownValue(format!(
                    "{}/{key}",
                    node.entity_ref
                )))
            })
    }

    // ── Hierarchy mutation ──────────────────────────────────────────────────

    /// Move `child` under a new parent.
    ///
    /// On a sibling name collision the incoming child is renamed, never
    /// rejected. Fires, in order: `EntityReparented` on the child,
    /// `ChildReparented` on the new parent, `DescendantReparented` on every
    /// ancestor above it, then transform updates for the moved subtree.
    ///
    /// # Errors
    ///
    /// Fails on missing entities, on roots, and on moves that would make an
    /// entity its own ancestor.
    pub fn append(&mut self, parent: EntityId, child: EntityId) -> Result<(), SceneError> {
        let parent_path = self.node(parent)?.path.clone();
        let (child_path, previous_parent, desired_name) = {
            let n = self.node(child)?;
            (n.path.clone(), n.parent, n.name.clone())
        };
        let Some(previous_parent) = previous_parent else {
            return Err(SceneError::RootImmutable(child_path));
        };
        if parent == child || self.is_ancestor(child, parent) {
            return Err(SceneError::WouldCycle {
                parent: parent_path,
                child: child_path,
            });
        }

        // Detach, pick a free name among the new siblings, reattach.
        if let Some(old) = self.nodes.get_mut(&previous_parent) {
            old.children.retain(|&c| c != child);
        }
        let name = deduplicate_name(&desired_name, |candidate| {
            self.child_by_name(parent, candidate).is_some()
        });
        if let Some(node) = self.nodes.get_mut(&child) {
            node.name = name;
            node.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }

        let mut queue = Vec::new();
        queue_entity(
            &mut queue,
            child,
            EntityReparented {
                entity: child,
                previous_parent: Some(previous_parent),
            },
        );
        queue_entity(&mut queue, parent, ChildReparented { parent, child });
        for ancestor in self.ancestors_of(parent) {
            queue_entity(
                &mut queue,
                ancestor,
                DescendantReparented {
                    ancestor,
                    descendant: child,
                },
            );
        }
        self.move_subtree(child, &mut queue);
        self.dispatch(queue);
        Ok(())
    }

    /// Rename an entity in place.
    ///
    /// Detaches and reattaches under the new (deduplicated) name, recomputes
    /// the path of the whole subtree, then fires `EntityRenamed`,
    /// `ChildRenamed`, and `DescendantRenamed`. Returns the name actually
    /// applied.
    ///
    /// # Errors
    ///
    /// Fails on missing entities and on roots.
    pub fn rename(
        &mut self,
        entity: EntityId,
        new_name: impl Into<String>,
    ) -> Result<String, SceneError> {
        let new_name = new_name.into();
        let (parent, previous, path) = {
            let n = self.node(entity)?;
            (n.parent, n.name.clone(), n.path.clone())
        };
        let Some(parent) = parent else {
            return Err(SceneError::RootImmutable(path));
        };
        if new_name == previous {
            return Ok(previous);
        }

        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != entity);
        }
        let name = deduplicate_name(&new_name, |candidate| {
            self.child_by_name(parent, candidate).is_some()
        });
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.name = name.clone();
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(entity);
        }
        self.repath_subtree(entity);

        let mut queue = Vec::new();
        queue_entity(&mut queue, entity, EntityRenamed { entity, previous });
        queue_entity(&mut queue, parent, ChildRenamed { parent, child: entity });
        for ancestor in self.ancestors_of(parent) {
            queue_entity(
                &mut queue,
                ancestor,
                DescendantRenamed {
                    ancestor,
                    descendant: entity,
                },
            );
        }
        self.dispatch(queue);
        Ok(name)
    }

    /// Destroy an entity and its whole subtree.
    ///
    /// Fires exactly one `EntityDestroyed` per destroyed node (plus
    /// child/descendant notifications computed on the intact tree), then
    /// tears down behaviors, value cells, subscriptions, listener tables,
    /// and store entries. Destroying an already-destroyed entity is a
    /// silent no-op and never re-fires signals.
    ///
    /// # Errors
    ///
    /// Fails only for roots.
    pub fn destroy(&mut self, entity: EntityId) -> Result<(), SceneError> {
        let Some(node) = self.nodes.get(&entity) else {
            return Ok(());
        };
        let Some(outer_parent) = node.parent else {
            return Err(SceneError::RootImmutable(node.path.clone()));
        };

        let subtree = self.collect_subtree(entity);
        let mut queue = Vec::new();
        for &n in &subtree {
            queue_entity(&mut queue, n, EntityDestroyed { entity: n });
            queue_scene(&mut queue, EntityDestroyed { entity: n });
            if let Some(parent) = self.nodes.get(&n).and_then(|node| node.parent) {
                queue_entity(&mut queue, parent, ChildDestroyed { parent, child: n });
                for ancestor in self.ancestors_of(parent) {
                    queue_entity(
                        &mut queue,
                        ancestor,
                        DescendantDestroyed {
                            ancestor,
                            descendant: n,
                        },
                    );
                }
            }
        }
        self.dispatch(queue);

        if let Some(p) = self.nodes.get_mut(&outer_parent) {
            p.children.retain(|&c| c != entity);
        }
        // Children before parents, so subscriptions onto parents still
        // resolve during teardown.
        for &n in subtree.iter().rev() {
            if let Some(mut node) = self.nodes.remove(&n) {
                node.state = LifecycleState::Destroyed;
                self.store
                    .unregister(node.root, n, &node.path, node.entity_ref, node.kind);
                for (_, value_id) in &node.values {
                    self.values.destroy(value_id);
                }
                for behavior in &mut node.behaviors {
                    behavior.on_destroy();
                }
                for (target, handle) in node.subscriptions.drain(..) {
                    if let Some(t) = self.nodes.get_mut(&target) {
                        t.router.unregister(handle);
                    }
                }
                node.router.clear();
            }
        }
        Ok(())
    }

    // ── Transforms ──────────────────────────────────────────────────────────

    /// An entity's local transform.
    pub fn transform(&self, entity: EntityId) -> Result<Transform, SceneError> {
        Ok(self.node(entity)?.transform)
    }

    /// An entity's world transform.
    pub fn global_transform(&self, entity: EntityId) -> Result<Transform, SceneError> {
        Ok(self.node(entity)?.global_transform)
    }

    /// Set the local transform, recomputing the world transform from the
    /// parent and re-deriving every descendant's world transform.
    ///
    /// `EntityTransformUpdate` fires per affected node after the whole
    /// subtree is consistent.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity.
    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) -> Result<(), SceneError> {
        let parent_global = self.parent_global(entity)?;
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.transform = transform;
            node.global_transform = local_to_world(&parent_global, &transform);
        }
        let mut queue = Vec::new();
        queue_entity(&mut queue, entity, EntityTransformUpdate { entity });
        queue_scene(&mut queue, EntityTransformUpdate { entity });
        self.propagate_to_descendants(entity, &mut queue);
        self.dispatch(queue);
        Ok(())
    }

    /// Set the world transform directly, back-deriving the local transform
    /// from the parent's world transform and propagating to descendants.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity.
    pub fn set_global_transform(
        &mut self,
        entity: EntityId,
        global: Transform,
    ) -> Result<(), SceneError> {
        let parent_global = self.parent_global(entity)?;
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.global_transform = global;
            node.transform = world_to_local(&parent_global, &global);
        }
        let mut queue = Vec::new();
        queue_entity(&mut queue, entity, EntityTransformUpdate { entity });
        queue_scene(&mut queue, EntityTransformUpdate { entity });
        self.propagate_to_descendants(entity, &mut queue);
        self.dispatch(queue);
        Ok(())
    }

    /// Set the local-space bounds size used by point queries, or `None` to
    /// make the entity invisible to them.
    pub fn set_bounds(&mut self, entity: EntityId, bounds: Option<Vec2>) -> Result<(), SceneError> {
        self.node_mut(entity)?.bounds = bounds;
        Ok(())
    }

    /// All live entities whose bounds contain the given world-space point.
    ///
    /// The point is inverse-transformed into each candidate's local space
    /// and tested against its axis-aligned bounds box. Results are in id
    /// order.
    #[must_use]
    pub fn entities_at_point(&self, point: Vec2) -> Vec<EntityId> {
        let mut hits: Vec<EntityId> = self
            .nodes
            .iter()
            .filter_map(|(&id, node)| {
                let size = node.bounds?;
                let local = point_world_to_local(&node.global_transform, point);
                (local.x.abs() <= size.x / 2.0 && local.y.abs() <= size.y / 2.0).then_some(id)
            })
            .collect();
        hits.sort_unstable();
        hits
    }

    // ── Authority ───────────────────────────────────────────────────────────

    /// The entity's current authoritative owner, if any.
    pub fn authority(&self, entity: EntityId) -> Result<Option<&WriterSource>, SceneError> {
        Ok(self.node(entity)?.authority.as_ref())
    }

    /// Local authority write: proposes `observed clock + 1` stamped with
    /// this instance's source, applies it, and returns the mutation to
    /// broadcast. Pass `None` to relinquish.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity.
    pub fn request_authority(
        &mut self,
        entity: EntityId,
        owner: Option<WriterSource>,
    ) -> Result<AuthorityMutation, SceneError> {
        let source = self.values.source().clone();
        let node = self.node_mut(entity)?;
        node.authority_clock += 1;
        node.authority = owner.clone();
        node.authority_source = source.clone();
        Ok(AuthorityMutation {
            entity_ref: node.entity_ref,
            owner,
            clock: node.authority_clock,
            source,
        })
    }

    /// Network receipt path for authority, addressed by stable ref and
    /// resolved with the identical clock discipline as values.
    ///
    /// # Errors
    ///
    /// Fails if the ref does not resolve to a live entity.
    pub fn apply_authority(
        &mut self,
        mutation: &AuthorityMutation,
    ) -> Result<Acceptance, SceneError> {
        let id = self
            .store
            .all()
            .by_ref(mutation.entity_ref)
            .ok_or(SceneError::RefNotFound(mutation.entity_ref))?;
        let node = self.node_mut(id)?;
        let acceptance = resolve(
            node.authority_clock,
            &node.authority_source,
            mutation.clock,
            &mutation.source,
        );
        if acceptance.is_accepted() {
            node.authority = mutation.owner.clone();
            node.authority_clock = mutation.clock;
            node.authority_source = mutation.source.clone();
        }
        Ok(acceptance)
    }

    // ── Signals ─────────────────────────────────────────────────────────────

    /// Register a listener on an entity's router.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity.
    pub fn on<S, F>(&mut self, target: EntityId, f: F) -> Result<ListenerHandle, SceneError>
    where
        S: SignalOn<EntityScope>,
        F: FnMut(&S) + 'static,
    {
        Ok(self.node_mut(target)?.router.on(f))
    }

    /// Register a listener on `target` owned by `owner`: the handle is
    /// revoked automatically when `owner` is destroyed.
    ///
    /// # Errors
    ///
    /// Fails if either entity is missing.
    pub fn subscribe<S, F>(
        &mut self,
        owner: EntityId,
        target: EntityId,
        f: F,
    ) -> Result<ListenerHandle, SceneError>
    where
        S: SignalOn<EntityScope>,
        F: FnMut(&S) + 'static,
    {
        self.node(owner)?;
        let handle = self.node_mut(target)?.router.on(f);
        if let Some(node) = self.nodes.get_mut(&owner) {
            node.subscriptions.push((target, handle));
        }
        Ok(handle)
    }

    /// Remove a listener from an entity's router.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity.
    pub fn unregister(
        &mut self,
        target: EntityId,
        handle: ListenerHandle,
    ) -> Result<bool, SceneError> {
        Ok(self.node_mut(target)?.router.unregister(handle))
    }

    /// Register a listener on the scene-level router.
    pub fn on_scene<S, F>(&mut self, f: F) -> ListenerHandle
    where
        S: SignalOn<SceneScope>,
        F: FnMut(&S) + 'static,
    {
        self.router.on(f)
    }

    /// Remove a scene-level listener.
    pub fn unregister_scene(&mut self, handle: ListenerHandle) -> bool {
        self.router.unregister(handle)
    }

    /// Fire a signal on an entity's router.
    ///
    /// # Errors
    ///
    /// Fails on a missing entity.
    pub fn fire<S: SignalOn<EntityScope>>(
        &mut self,
        target: EntityId,
        signal: S,
    ) -> Result<(), SceneError> {
        self.node(target)?;
        let mut queue = Vec::new();
        queue_entity(&mut queue, target, signal);
        self.dispatch(queue);
        Ok(())
    }

    /// Fire a signal on the scene-level router.
    pub fn fire_scene<S: SignalOn<SceneScope>>(&mut self, signal: S) {
        let mut queue = Vec::new();
        queue_scene(&mut queue, signal);
        self.dispatch(queue);
    }

    // ── Tick driver ─────────────────────────────────────────────────────────

    /// First phase of a tick: promote constructed entities, then run every
    /// spawned entity's pre-tick behaviors, whole subtree before the tick
    /// phase starts.
    pub fn pre_tick(&mut self, dt: f64) {
        self.tick_id += 1;
        self.promote_constructed();
        self.run_phase(Phase::PreTick, dt, 0.0);
    }

    /// Main tick phase.
    pub fn tick(&mut self, dt: f64) {
        self.run_phase(Phase::Tick, dt, 0.0);
    }

    /// Render interpolation phase, with the fraction into the current tick.
    pub fn interpolate(&mut self, dt: f64, alpha: f64) {
        self.run_phase(Phase::Interpolate, dt, alpha);
    }

    /// Promote `Constructed → Spawned`, parents before children. The
    /// prefabs root subtree is never promoted.
    fn promote_constructed(&mut self) {
        let mut queue = Vec::new();
        for id in self.tickable_entities() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.state != LifecycleState::Constructed {
                continue;
            }
            node.state = LifecycleState::Spawned;
            let mut behaviors = mem::take(&mut node.behaviors);
            for behavior in &mut behaviors {
                if let Err(err) = behavior.on_spawn(self, id) {
                    error!(
                        entity = %self.path_for_log(id),
                        behavior = behavior.name(),
                        error = %err,
                        "spawn hook failed"
                    );
                }
            }
            self.restore_behaviors(id, behaviors);
            queue_entity(&mut queue, id, EntitySpawned { entity: id });
            queue_scene(&mut queue, EntitySpawned { entity: id });
        }
        self.dispatch(queue);
    }

    fn run_phase(&mut self, phase: Phase, dt: f64, alpha: f64) {
        let ctx = TickContext {
            tick_id: self.tick_id,
            dt,
            alpha,
        };
        for id in self.tickable_entities() {
            // Liveness re-check: a behavior earlier in the walk may have
            // destroyed this entity.
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.state != LifecycleState::Spawned || node.behaviors.is_empty() {
                continue;
            }
            let mut behaviors = mem::take(&mut node.behaviors);
            for behavior in &mut behaviors {
                let result = match phase {
                    Phase::PreTick => behavior.pre_tick(self, id, &ctx),
                    Phase::Tick => behavior.tick(self, id, &ctx),
                    Phase::Interpolate => behavior.interpolate(self, id, &ctx),
                };
                if let Err(err) = result {
                    // One entity misbehaving must not take the frame down.
                    error!(
                        entity = %self.path_for_log(id),
                        behavior = behavior.name(),
                        phase = phase.as_str(),
                        error = %err,
                        "behavior failed; siblings continue"
                    );
                }
            }
            self.restore_behaviors(id, behaviors);
        }
    }

    /// Put a detached behavior list back, keeping any behaviors attached
    /// during the callbacks. Dropped silently if the entity destroyed
    /// itself.
    fn restore_behaviors(&mut self, id: EntityId, mut behaviors: Vec<Box<dyn Behavior>>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            behaviors.append(&mut node.behaviors);
            node.behaviors = behaviors;
        }
    }

    /// Tick-order walk of the world, local, and server roots: parents
    /// strictly before children.
    fn tickable_entities(&self) -> Vec<EntityId> {
        let mut out = Vec::new();
        for root in [SceneRoot::World, SceneRoot::Local, SceneRoot::Server] {
            self.collect_subtree_into(self.roots[&root], &mut out);
        }
        out
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn node(&self, id: EntityId) -> Result<&EntityNode, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::EntityNotFound(id))
    }

    fn node_mut(&mut self, id: EntityId) -> Result<&mut EntityNode, SceneError> {
        self.nodes
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))
    }

    fn path_for_log(&self, id: EntityId) -> String {
        self.nodes
            .get(&id)
            .map_or_else(|| format!("{id}"), |n| n.path.clone())
    }

    fn child_by_name(&self, parent: EntityId, name: &str) -> Option<EntityId> {
        let parent = self.nodes.get(&parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// Is `ancestor` a strict ancestor of `entity`?
    fn is_ancestor(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut current = self.nodes.get(&entity).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Strict ancestors of `entity`, nearest first.
    fn ancestors_of(&self, entity: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&entity).and_then(|n| n.parent);
        while let Some(id) = current {
            out.push(id);
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        out
    }

    /// Preorder subtree walk: each node before its children.
    fn collect_subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.collect_subtree_into(id, &mut out);
        out
    }

    fn collect_subtree_into(&self, id: EntityId, out: &mut Vec<EntityId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        out.push(id);
        for &child in &node.children {
            self.collect_subtree_into(child, out);
        }
    }

    fn parent_global(&self, entity: EntityId) -> Result<Transform, SceneError> {
        let node = self.node(entity)?;
        Ok(match node.parent {
            Some(p) => self.node(p)?.global_transform,
            None => Transform::IDENTITY,
        })
    }

    /// Re-derive descendants' world transforms from their unchanged locals,
    /// queuing a transform update per node.
    fn propagate_to_descendants(&mut self, id: EntityId, queue: &mut Vec<QueuedSignal>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let parent_global = node.global_transform;
        let children = node.children.clone();
        for child in children {
            if let Some(child_node) = self.nodes.get_mut(&child) {
                child_node.global_transform = local_to_world(&parent_global, &child_node.transform);
            }
            queue_entity(queue, child, EntityTransformUpdate { entity: child });
            queue_scene(queue, EntityTransformUpdate { entity: child });
            self.propagate_to_descendants(child, queue);
        }
    }

    /// Recompute root, depth, path, and world transform for a moved subtree,
    /// keeping the store in lockstep.
    fn move_subtree(&mut self, id: EntityId, queue: &mut Vec<QueuedSignal>) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        let Some((root, depth, path, global)) =
            parent.and_then(|p| self.nodes.get(&p)).map(|p| {
                (p.root, p.depth, p.path.clone(), p.global_transform)
            })
        else {
            return;
        };
        self.move_subtree_inner(id, root, depth, &path, global, queue);
    }

    fn move_subtree_inner(
        &mut self,
        id: EntityId,
        parent_root: SceneRoot,
        parent_depth: u16,
        parent_path: &str,
        parent_global: Transform,
        queue: &mut Vec<QueuedSignal>,
    ) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let old_root = node.root;
        let old_path = node.path.clone();
        let entity_ref = node.entity_ref;
        let kind = node.kind;
        let children = node.children.clone();
        let local = node.transform;

        let depth = parent_depth + 1;
        let path = format!("{parent_path}.{}", node.name);
        if depth > DEPTH_WARN_LIMIT {
            warn!(%path, depth, "hierarchy depth exceeds recursion safety limit");
        }
        let global = local_to_world(&parent_global, &local);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.root = parent_root;
            node.depth = depth;
            node.path = path.clone();
            node.global_transform = global;
        }

        if old_root == parent_root {
            if old_path != path {
                self.store.repath(old_root, id, &old_path, &path);
            }
        } else {
            self.store
                .unregister(old_root, id, &old_path, entity_ref, kind);
            if let Err(err) = self.store.register(parent_root, id, &path, entity_ref, kind) {
                error!(%path, error = %err, "re-registration after root move failed");
            }
        }

        queue_entity(queue, id, EntityTransformUpdate { entity: id });
        queue_scene(queue, EntityTransformUpdate { entity: id });
        for child in children {
            self.move_subtree_inner(child, parent_root, depth, &path, global, queue);
        }
    }

    /// Recompute subtree paths after a rename. Root, depth, and transforms
    /// are unchanged.
    fn repath_subtree(&mut self, id: EntityId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        let Some(parent_path) = parent
            .and_then(|p| self.nodes.get(&p))
            .map(|p| p.path.clone())
        else {
            return;
        };
        self.repath_subtree_inner(id, &parent_path);
    }

    fn repath_subtree_inner(&mut self, id: EntityId, parent_path: &str) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let old_path = node.path.clone();
        let root = node.root;
        let children = node.children.clone();
        let path = format!("{parent_path}.{}", node.name);
        if path != old_path {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.path = path.clone();
            }
            self.store.repath(root, id, &old_path, &path);
        }
        for child in children {
            self.repath_subtree_inner(child, &path);
        }
    }

    /// Deliver queued signals. Routers are detached while firing so
    /// listeners never observe a half-mutated tree; a destroyed target
    /// simply drops its queued signals.
    fn dispatch(&mut self, queue: Vec<QueuedSignal>) {
        for item in queue {
            match item.target {
                SignalTarget::Entity(id) => {
                    let Some(mut router) = self
                        .nodes
                        .get_mut(&id)
                        .map(|n| mem::take(&mut n.router))
                    else {
                        continue;
                    };
                    router.fire_boxed(item.type_id, item.payload.as_ref());
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.router = router;
                    }
                }
                SignalTarget::Scene => {
                    let mut router = mem::take(&mut self.router);
                    router.fire_boxed(item.type_id, item.payload.as_ref());
                    self.router = router;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::f32::consts::FRAC_PI_2;
    use std::rc::Rc;

    use engine_signal::Signal;
    use serde_json::json;

    use super::*;

    fn scene() -> Scene {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Scene::new(WriterSource::Server)
    }

    fn assert_vec2_eq(actual: Vec2, expected: Vec2) {
        assert!(
            (actual - expected).length() < 1e-4,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_roots_exist_and_are_spawned() {
        let scene = scene();
        assert_eq!(scene.entity_count(), 4);
        for root in SceneRoot::ALL {
            let id = scene.root(root);
            assert_eq!(scene.path(id).unwrap(), root.as_str());
            assert_eq!(scene.state(id).unwrap(), LifecycleState::Spawned);
            assert_eq!(scene.parent(id).unwrap(), None);
        }
        assert_eq!(
            scene.store().all().by_path("world"),
            Some(scene.root(SceneRoot::World))
        );
    }

    #[test]
    fn test_spawn_builds_paths_and_indices() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "holder")
                    .with_child(EntityDefinition::new(EntityKind::Sprite, "icon")),
            )
            .unwrap();

        assert_eq!(scene.path(parent).unwrap(), "world.holder");
        let child = scene.get_child(parent, "icon").unwrap();
        assert_eq!(scene.path(child).unwrap(), "world.holder.icon");
        assert_eq!(scene.depth(child).unwrap(), 2);
        assert_eq!(scene.store().all().by_path("world.holder.icon"), Some(child));
        assert_eq!(
            scene.store().root(SceneRoot::World).of_kind(EntityKind::Sprite),
            vec![child]
        );
        assert_eq!(scene.state(child).unwrap(), LifecycleState::Constructed);
    }

    #[test]
    fn test_failed_spawn_unwinds_the_whole_subtree() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        // The grandchild's duplicate value key fails mid-construction, after
        // the first child (and its cell) already exist.
        let result = scene.spawn(
            world,
            EntityDefinition::new(EntityKind::Empty, "squad")
                .with_child(
                    EntityDefinition::new(EntityKind::Sprite, "scout")
                        .with_value("hp", json!(10.0)),
                )
                .with_child(
                    EntityDefinition::new(EntityKind::Empty, "pack").with_child(
                        EntityDefinition::new(EntityKind::Sprite, "mule")
                            .with_value("load", json!(1.0))
                            .with_value("load", json!(2.0)),
                    ),
                ),
        );

        assert!(matches!(
            result,
            Err(SceneError::Value(ValueError::DuplicateValue(_)))
        ));
        // Nothing from the failed spawn survives: no nodes, index entries,
        // or value cells.
        assert_eq!(scene.entity_count(), 4);
        assert_eq!(scene.store().all().by_path("world.squad"), None);
        assert_eq!(scene.store().all().by_path("world.squad.scout"), None);
        assert!(scene.store().all().of_kind(EntityKind::Sprite).is_empty());
        assert!(scene.values().is_empty());
        assert!(scene.children(world).unwrap().is_empty());
    }

    #[test]
    fn test_deep_chains_survive_past_the_recursion_warn_limit() {
        let mut scene = scene();
        let mut tail = scene.root(SceneRoot::World);
        for i in 0..=usize::from(DEPTH_WARN_LIMIT) {
            tail = scene
                .spawn(tail, EntityDefinition::new(EntityKind::Empty, format!("n{i}")))
                .unwrap();
        }

        assert_eq!(scene.depth(tail).unwrap(), DEPTH_WARN_LIMIT + 1);
        let tail_path = scene.path(tail).unwrap();
        assert_eq!(scene.store().all().by_path(&tail_path), Some(tail));

        // The chain stays fully usable past the warning: transforms still
        // propagate top-down and the whole thing tears down cleanly.
        let head = scene.get_child(scene.root(SceneRoot::World), "n0").unwrap();
        scene
            .set_transform(head, Transform::from_translation(Vec2::new(3.0, 0.0)))
            .unwrap();
        assert_vec2_eq(
            scene.global_transform(tail).unwrap().translation,
            Vec2::new(3.0, 0.0),
        );
        scene.destroy(head).unwrap();
        assert_eq!(scene.entity_count(), 4);
    }

    #[test]
    fn test_sibling_names_are_deduplicated() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let a = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "crate"))
            .unwrap();
        let b = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "crate"))
            .unwrap();
        let c = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "crate"))
            .unwrap();

        assert_eq!(scene.name(a).unwrap(), "crate");
        assert_eq!(scene.name(b).unwrap(), "crate.1");
        assert_eq!(scene.name(c).unwrap(), "crate.2");
    }

    #[test]
    fn test_rename_repaths_descendants() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "old")
                    .with_child(EntityDefinition::new(EntityKind::Empty, "leaf")),
            )
            .unwrap();
        let leaf = scene.get_child(parent, "leaf").unwrap();

        let applied = scene.rename(parent, "new").unwrap();
        assert_eq!(applied, "new");
        assert_eq!(scene.path(leaf).unwrap(), "world.new.leaf");
        assert_eq!(scene.store().all().by_path("world.old.leaf"), None);
        assert_eq!(scene.store().all().by_path("world.new.leaf"), Some(leaf));
    }

    #[test]
    fn test_rename_collision_is_deduplicated() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let _a = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "taken"))
            .unwrap();
        let b = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "free"))
            .unwrap();

        let applied = scene.rename(b, "taken").unwrap();
        assert_eq!(applied, "taken.1");
        assert_eq!(scene.path(b).unwrap(), "world.taken.1");
    }

    #[test]
    fn test_rename_signal_order() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "holder")
                    .with_child(EntityDefinition::new(EntityKind::Empty, "leaf")),
            )
            .unwrap();
        let leaf = scene.get_child(parent, "leaf").unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let sink = order.clone();
        scene
            .on(leaf, move |s: &EntityRenamed| {
                sink.borrow_mut().push(format!("renamed from {}", s.previous));
            })
            .unwrap();
        let sink = order.clone();
        scene
            .on(parent, move |_: &ChildRenamed| sink.borrow_mut().push("child".to_string()))
            .unwrap();
        let sink = order.clone();
        scene
            .on(world, move |_: &DescendantRenamed| {
                sink.borrow_mut().push("descendant".to_string());
            })
            .unwrap();

        scene.rename(leaf, "blade").unwrap();
        assert_eq!(
            *order.borrow(),
            vec!["renamed from leaf", "child", "descendant"]
        );
    }

    #[test]
    fn test_append_moves_subtree_across_roots() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let prefabs = scene.root(SceneRoot::Prefabs);
        let template = scene
            .spawn(
                prefabs,
                EntityDefinition::new(EntityKind::Sprite, "goblin")
                    .with_child(EntityDefinition::new(EntityKind::Empty, "anchor")),
            )
            .unwrap();
        let anchor = scene.get_child(template, "anchor").unwrap();

        scene.append(world, template).unwrap();

        assert_eq!(scene.path(template).unwrap(), "world.goblin");
        assert_eq!(scene.path(anchor).unwrap(), "world.goblin.anchor");
        assert_eq!(
            scene.store().root(SceneRoot::Prefabs).by_path("prefabs.goblin"),
            None
        );
        assert_eq!(
            scene.store().root(SceneRoot::World).by_path("world.goblin"),
            Some(template)
        );
        assert_eq!(scene.parent(template).unwrap(), Some(world));
    }

    #[test]
    fn test_append_renames_on_collision() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let local = scene.root(SceneRoot::Local);
        let _resident = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "hud"))
            .unwrap();
        let incoming = scene
            .spawn(local, EntityDefinition::new(EntityKind::Empty, "hud"))
            .unwrap();

        scene.append(world, incoming).unwrap();
        assert_eq!(scene.name(incoming).unwrap(), "hud.1");
        assert_eq!(scene.path(incoming).unwrap(), "world.hud.1");
    }

    #[test]
    fn test_append_rejects_cycles_and_roots() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let outer = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "outer")
                    .with_child(EntityDefinition::new(EntityKind::Empty, "inner")),
            )
            .unwrap();
        let inner = scene.get_child(outer, "inner").unwrap();

        assert!(matches!(
            scene.append(inner, outer),
            Err(SceneError::WouldCycle { .. })
        ));
        assert!(matches!(
            scene.append(outer, outer),
            Err(SceneError::WouldCycle { .. })
        ));
        assert!(matches!(
            scene.append(outer, world),
            Err(SceneError::RootImmutable(_))
        ));
        // The failed moves changed nothing.
        assert_eq!(scene.path(inner).unwrap(), "world.outer.inner");
    }

    #[test]
    fn test_reparent_signal_order() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let old_parent = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "old"))
            .unwrap();
        let new_parent = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "new"))
            .unwrap();
        let child = scene
            .spawn(old_parent, EntityDefinition::new(EntityKind::Empty, "mover"))
            .unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let sink = order.clone();
        scene
            .on(child, move |s: &EntityReparented| {
                assert_eq!(s.previous_parent, Some(old_parent));
                sink.borrow_mut().push("reparented");
            })
            .unwrap();
        let sink = order.clone();
        scene
            .on(new_parent, move |_: &ChildReparented| sink.borrow_mut().push("child"))
            .unwrap();
        let sink = order.clone();
        scene
            .on(world, move |_: &DescendantReparented| sink.borrow_mut().push("descendant"))
            .unwrap();

        scene.append(new_parent, child).unwrap();
        assert_eq!(*order.borrow(), vec!["reparented", "child", "descendant"]);
    }

    // ── Transforms ──────────────────────────────────────────────────────────

    #[test]
    fn test_child_global_follows_parent() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "parent")
                    .with_transform(Transform::from_translation(Vec2::new(10.0, 0.0)))
                    .with_child(
                        EntityDefinition::new(EntityKind::Empty, "child")
                            .with_transform(Transform::from_translation(Vec2::new(5.0, 0.0))),
                    ),
            )
            .unwrap();
        let child = scene.get_child(parent, "child").unwrap();

        let global = scene.global_transform(child).unwrap();
        assert_vec2_eq(global.translation, Vec2::new(15.0, 0.0));

        // Rotating the parent 90° swings the child around it.
        scene
            .set_transform(
                parent,
                Transform::from_translation_rotation(Vec2::new(10.0, 0.0), FRAC_PI_2),
            )
            .unwrap();
        let global = scene.global_transform(child).unwrap();
        assert_vec2_eq(global.translation, Vec2::new(10.0, 5.0));
        assert!((global.rotation - FRAC_PI_2).abs() < 1e-6);
        // The child's own local transform never moved.
        assert_vec2_eq(
            scene.transform(child).unwrap().translation,
            Vec2::new(5.0, 0.0),
        );
    }

    #[test]
    fn test_set_global_back_derives_local() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "parent")
                    .with_transform(Transform::from_translation_rotation(
                        Vec2::new(10.0, 0.0),
                        FRAC_PI_2,
                    ))
                    .with_child(EntityDefinition::new(EntityKind::Empty, "child")),
            )
            .unwrap();
        let child = scene.get_child(parent, "child").unwrap();

        let target = Transform::from_translation(Vec2::new(10.0, -2.5));
        scene.set_global_transform(child, target).unwrap();

        // Local is whatever reproduces the requested global under the parent.
        let local = scene.transform(child).unwrap();
        let parent_global = scene.global_transform(parent).unwrap();
        let roundtrip = local_to_world(&parent_global, &local);
        assert_vec2_eq(roundtrip.translation, target.translation);
        assert_vec2_eq(local.translation, Vec2::new(-2.5, 0.0));
        assert_vec2_eq(
            scene.global_transform(child).unwrap().translation,
            Vec2::new(10.0, -2.5),
        );
    }

    #[test]
    fn test_transform_updates_fire_parent_then_child() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "parent")
                    .with_child(EntityDefinition::new(EntityKind::Empty, "child")),
            )
            .unwrap();
        let child = scene.get_child(parent, "child").unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let sink = order.clone();
        scene
            .on(parent, move |_: &EntityTransformUpdate| sink.borrow_mut().push("parent"))
            .unwrap();
        let sink = order.clone();
        scene
            .on(child, move |_: &EntityTransformUpdate| sink.borrow_mut().push("child"))
            .unwrap();
        let scene_count = Rc::new(RefCell::new(0));
        let sink = scene_count.clone();
        scene.on_scene(move |_: &EntityTransformUpdate| *sink.borrow_mut() += 1);

        scene
            .set_transform(parent, Transform::from_translation(Vec2::new(1.0, 1.0)))
            .unwrap();
        assert_eq!(*order.borrow(), vec!["parent", "child"]);
        assert_eq!(*scene_count.borrow(), 2);
    }

    #[test]
    fn test_entities_at_point_respects_rotation() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let wide = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Sprite, "wide")
                    .with_transform(Transform::from_translation_rotation(
                        Vec2::new(10.0, 0.0),
                        FRAC_PI_2,
                    ))
                    .with_bounds(Vec2::new(4.0, 1.0)),
            )
            .unwrap();
        let _unbounded = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "marker")
                    .with_transform(Transform::from_translation(Vec2::new(10.0, 0.0))),
            )
            .unwrap();

        // The 4-wide axis is vertical after the rotation.
        assert_eq!(scene.entities_at_point(Vec2::new(10.0, 1.5)), vec![wide]);
        assert_eq!(scene.entities_at_point(Vec2::new(11.5, 0.0)), Vec::new());
        assert_eq!(scene.entities_at_point(Vec2::new(10.3, 0.0)), vec![wide]);
    }

    // ── Destruction ─────────────────────────────────────────────────────────

    #[test]
    fn test_destroy_cascade_fires_once_per_node() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "squad")
                    .with_child(
                        EntityDefinition::new(EntityKind::Sprite, "a")
                            .with_child(EntityDefinition::new(EntityKind::Empty, "weapon")),
                    )
                    .with_child(EntityDefinition::new(EntityKind::Sprite, "b")),
            )
            .unwrap();

        let destroyed = Rc::new(RefCell::new(Vec::new()));
        let sink = destroyed.clone();
        scene.on_scene(move |s: &EntityDestroyed| sink.borrow_mut().push(s.entity));
        let child_notices = Rc::new(RefCell::new(0));
        let sink = child_notices.clone();
        scene
            .on(world, move |_: &ChildDestroyed| *sink.borrow_mut() += 1)
            .unwrap();

        scene.destroy(parent).unwrap();

        assert_eq!(destroyed.borrow().len(), 4);
        // Only the subtree head is a direct child of the world root.
        assert_eq!(*child_notices.borrow(), 1);
        assert_eq!(scene.entity_count(), 4);
        assert_eq!(scene.store().all().by_path("world.squad"), None);
        assert!(scene.store().all().of_kind(EntityKind::Sprite).is_empty());

        // Destroying again is a silent no-op.
        scene.destroy(parent).unwrap();
        assert_eq!(destroyed.borrow().len(), 4);
    }

    #[test]
    fn test_destroy_releases_value_cells() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let entity = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Sprite, "orc")
                    .with_value("health", json!(100.0)),
            )
            .unwrap();
        let value_id = scene.value_id(entity, "health").unwrap();
        assert!(scene.values().contains(&value_id));

        scene.destroy(entity).unwrap();
        assert!(!scene.values().contains(&value_id));
    }

    #[test]
    fn test_destroy_revokes_owned_subscriptions() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let watcher = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "watcher"))
            .unwrap();
        let target = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "target"))
            .unwrap();

        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        scene
            .subscribe(watcher, target, move |_: &EntityRenamed| *sink.borrow_mut() += 1)
            .unwrap();

        scene.rename(target, "first").unwrap();
        assert_eq!(*count.borrow(), 1);

        scene.destroy(watcher).unwrap();
        scene.rename(target, "second").unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_roots_cannot_be_destroyed_or_renamed() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        assert!(matches!(
            scene.destroy(world),
            Err(SceneError::RootImmutable(_))
        ));
        assert!(matches!(
            scene.rename(world, "earth"),
            Err(SceneError::RootImmutable(_))
        ));
    }

    // ── Lookups ─────────────────────────────────────────────────────────────

    #[test]
    fn test_get_child_miss_is_an_error() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let parent = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "holder"))
            .unwrap();
        assert!(matches!(
            scene.get_child(parent, "ghost"),
            Err(SceneError::ChildNotFound { .. })
        ));
        assert!(matches!(
            scene.path(EntityId(9999)),
            Err(SceneError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_expect_kind_is_subtype_aware() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let anim = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::AnimatedSprite, "fx"),
            )
            .unwrap();

        assert!(scene.expect_kind(anim, EntityKind::Sprite).is_ok());
        assert!(scene.expect_kind(anim, EntityKind::Empty).is_ok());
        assert!(matches!(
            scene.expect_kind(anim, EntityKind::Rigidbody2D),
            Err(SceneError::KindMismatch { .. })
        ));
    }

    // ── Tick driver ─────────────────────────────────────────────────────────

    struct SpawnProbe {
        spawned: Rc<RefCell<u32>>,
    }

    impl Behavior for SpawnProbe {
        fn name(&self) -> &'static str {
            "spawn_probe"
        }

        fn on_spawn(&mut self, _scene: &mut Scene, _entity: EntityId) -> Result<()> {
            *self.spawned.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_lazy_promotion_on_first_pre_tick() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let spawned = Rc::new(RefCell::new(0));
        let entity = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "npc").with_behavior(SpawnProbe {
                    spawned: spawned.clone(),
                }),
            )
            .unwrap();

        let signals = Rc::new(RefCell::new(0));
        let sink = signals.clone();
        scene.on_scene(move |_: &EntitySpawned| *sink.borrow_mut() += 1);

        assert_eq!(scene.state(entity).unwrap(), LifecycleState::Constructed);
        scene.pre_tick(0.016);
        assert_eq!(scene.state(entity).unwrap(), LifecycleState::Spawned);
        assert_eq!(*spawned.borrow(), 1);
        assert_eq!(*signals.borrow(), 1);

        // Promotion happens exactly once.
        scene.pre_tick(0.016);
        assert_eq!(*spawned.borrow(), 1);
        assert_eq!(*signals.borrow(), 1);
        assert_eq!(scene.tick_id(), 2);
    }

    #[test]
    fn test_prefabs_are_never_promoted() {
        let mut scene = scene();
        let prefabs = scene.root(SceneRoot::Prefabs);
        let template = scene
            .spawn(prefabs, EntityDefinition::new(EntityKind::Sprite, "goblin"))
            .unwrap();

        scene.pre_tick(0.016);
        assert_eq!(scene.state(template).unwrap(), LifecycleState::Constructed);

        // Until appended into a live root.
        let world = scene.root(SceneRoot::World);
        scene.append(world, template).unwrap();
        scene.pre_tick(0.016);
        assert_eq!(scene.state(template).unwrap(), LifecycleState::Spawned);
    }

    struct Failing;

    impl Behavior for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn tick(&mut self, _scene: &mut Scene, _entity: EntityId, _ctx: &TickContext) -> Result<()> {
            anyhow::bail!("scripted failure")
        }
    }

    struct TickProbe {
        ticks: Rc<RefCell<Vec<u64>>>,
    }

    impl Behavior for TickProbe {
        fn tick(&mut self, _scene: &mut Scene, _entity: EntityId, ctx: &TickContext) -> Result<()> {
            self.ticks.borrow_mut().push(ctx.tick_id);
            Ok(())
        }
    }

    #[test]
    fn test_behavior_error_does_not_stop_siblings() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let ticks = Rc::new(RefCell::new(Vec::new()));
        scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "broken").with_behavior(Failing),
            )
            .unwrap();
        scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "fine").with_behavior(TickProbe {
                    ticks: ticks.clone(),
                }),
            )
            .unwrap();

        scene.pre_tick(0.016);
        scene.tick(0.016);
        scene.tick(0.016);
        assert_eq!(*ticks.borrow(), vec![1, 2]);
    }

    struct SelfDestruct;

    impl Behavior for SelfDestruct {
        fn tick(&mut self, scene: &mut Scene, entity: EntityId, _ctx: &TickContext) -> Result<()> {
            scene.destroy(entity)?;
            Ok(())
        }
    }

    #[test]
    fn test_behavior_may_destroy_its_own_entity() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let doomed = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "doomed").with_behavior(SelfDestruct),
            )
            .unwrap();
        scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Empty, "survivor").with_behavior(TickProbe {
                    ticks: ticks.clone(),
                }),
            )
            .unwrap();

        scene.pre_tick(0.016);
        scene.tick(0.016);
        assert!(matches!(
            scene.state(doomed),
            Err(SceneError::EntityNotFound(_))
        ));
        // The walk continues past the hole.
        assert_eq!(*ticks.borrow(), vec![1]);
        scene.tick(0.016);
        assert_eq!(*ticks.borrow(), vec![1, 2]);
    }

    // ── Values and authority ────────────────────────────────────────────────

    #[test]
    fn test_declared_values_use_stable_ids() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let entity = scene
            .spawn(
                world,
                EntityDefinition::new(EntityKind::Sprite, "orc")
                    .with_value("health", json!(100.0)),
            )
            .unwrap();
        let value_id = scene.value_id(entity, "health").unwrap();
        assert_eq!(
            value_id,
            format!("{}/health", scene.entity_ref(entity).unwrap())
        );

        // The id survives rename and reparent.
        scene.rename(entity, "troll").unwrap();
        let local = scene.root(SceneRoot::Local);
        scene.append(local, entity).unwrap();
        assert_eq!(scene.value_id(entity, "health").unwrap(), value_id);

        let mutation = scene
            .values_mut()
            .set(&value_id, json!(55.0))
            .unwrap();
        assert_eq!(mutation.clock, 1);
        assert_eq!(
            scene.values().get::<serde_json::Value>(&value_id).unwrap(),
            &json!(55.0)
        );
    }

    #[test]
    fn test_authority_resolution_matches_value_discipline() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let entity = scene
            .spawn(world, EntityDefinition::new(EntityKind::Rigidbody2D, "ball"))
            .unwrap();
        let entity_ref = scene.entity_ref(entity).unwrap();

        let claimed = scene
            .request_authority(entity, Some(WriterSource::Server))
            .unwrap();
        assert_eq!(claimed.clock, 1);
        assert_eq!(
            scene.authority(entity).unwrap(),
            Some(&WriterSource::Server)
        );

        // Equal clock from a client loses against the server's claim.
        let rival = AuthorityMutation {
            entity_ref,
            owner: Some(WriterSource::Client("c1".to_string())),
            clock: 1,
            source: WriterSource::Client("c1".to_string()),
        };
        assert_eq!(
            scene.apply_authority(&rival).unwrap(),
            Acceptance::Outranked
        );
        assert_eq!(
            scene.authority(entity).unwrap(),
            Some(&WriterSource::Server)
        );

        // A later clock wins, and None relinquishes.
        let release = AuthorityMutation {
            entity_ref,
            owner: None,
            clock: 2,
            source: WriterSource::Client("c1".to_string()),
        };
        assert_eq!(scene.apply_authority(&release).unwrap(), Acceptance::Accepted);
        assert_eq!(scene.authority(entity).unwrap(), None);
    }

    #[test]
    fn test_authority_for_unknown_ref_is_an_error() {
        let mut scene = scene();
        let mutation = AuthorityMutation {
            entity_ref: EntityRef::generate(),
            owner: None,
            clock: 1,
            source: WriterSource::Server,
        };
        assert!(matches!(
            scene.apply_authority(&mutation),
            Err(SceneError::RefNotFound(_))
        ));
    }

    // ── Custom signals ──────────────────────────────────────────────────────

    struct Damage {
        amount: f64,
    }
    impl Signal for Damage {}
    impl SignalOn<EntityScope> for Damage {}

    #[test]
    fn test_custom_signals_route_per_entity() {
        let mut scene = scene();
        let world = scene.root(SceneRoot::World);
        let a = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "a"))
            .unwrap();
        let b = scene
            .spawn(world, EntityDefinition::new(EntityKind::Empty, "b"))
            .unwrap();

        let total = Rc::new(RefCell::new(0.0));
        let sink = total.clone();
        let handle = scene
            .on(a, move |s: &Damage| *sink.borrow_mut() += s.amount)
            .unwrap();

        scene.fire(a, Damage { amount: 10.0 }).unwrap();
        scene.fire(b, Damage { amount: 99.0 }).unwrap();
        assert_eq!(*total.borrow(), 10.0);

        assert!(scene.unregister(a, handle).unwrap());
        scene.fire(a, Damage { amount: 10.0 }).unwrap();
        assert_eq!(*total.borrow(), 10.0);
    }
}

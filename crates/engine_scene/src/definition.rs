//! Declarative entity construction.
//!
//! An [`EntityDefinition`] is the sole construction entry point: kind, name,
//! initial transform, initial replicated values, attached behaviors, and
//! nested children. Definitions nest, and `Scene::spawn` guarantees parents
//! are fully constructed before their children.

use engine_math::Transform;
use glam::Vec2;
use serde_json::Value;

use crate::behavior::Behavior;
use crate::kind::EntityKind;

/// Blueprint for one entity and its declared subtree.
pub struct EntityDefinition {
    /// The entity's capability tag.
    pub kind: EntityKind,
    /// Desired name; deduplicated against siblings on insertion.
    pub name: String,
    /// Initial local transform.
    pub transform: Transform,
    /// Initial replicated values as `(key, primitive)` pairs.
    pub values: Vec<(String, Value)>,
    /// Logic modules to attach, in tick order.
    pub behaviors: Vec<Box<dyn Behavior>>,
    /// Child definitions, constructed after this entity.
    pub children: Vec<EntityDefinition>,
    /// Axis-aligned bounds size in local space, for point queries.
    pub bounds: Option<Vec2>,
}

impl EntityDefinition {
    /// Start a definition with the given kind and name.
    #[must_use]
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            transform: Transform::IDENTITY,
            values: Vec::new(),
            behaviors: Vec::new(),
            children: Vec::new(),
            bounds: None,
        }
    }

    /// Set the initial local transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Declare an initial replicated value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, initial: Value) -> Self {
        self.values.push((key.into(), initial));
        self
    }

    /// Attach a behavior. Behaviors run in attachment order.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl Behavior) -> Self {
        self.behaviors.push(Box::new(behavior));
        self
    }

    /// Declare a child entity.
    #[must_use]
    pub fn with_child(mut self, child: EntityDefinition) -> Self {
        self.children.push(child);
        self
    }

    /// Set the local-space bounds size used by point queries.
    #[must_use]
    pub fn with_bounds(mut self, size: Vec2) -> Self {
        self.bounds = Some(size);
        self
    }
}

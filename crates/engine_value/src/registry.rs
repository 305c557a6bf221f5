//! The per-game-instance value registry.
//!
//! One [`ValueRegistry`] exists per game instance and is the single
//! in-process arbiter of replicated state. Mutation is confined to the
//! single game-loop thread; concurrency only enters via interleaved network
//! message arrival, which the clock/identity resolution rule makes
//! order-independent, so no locking is involved anywhere.

use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::adapter::{Erased, ErasedAdapter, SerdeAdapter, ValueTypeAdapter};
use crate::error::ValueError;
use crate::mutation::ValueMutation;
use crate::resolve::{Acceptance, resolve};
use crate::source::WriterSource;

/// One replicated cell: current data, logical clock, last writer.
struct ValueCell {
    clock: u32,
    source: WriterSource,
    data: Box<dyn Any>,
    adapter: Rc<dyn ErasedAdapter>,
}

/// Map from value identifier to replicated cell, stamped with this process's
/// own writer identity.
pub struct ValueRegistry {
    source: WriterSource,
    values: BTreeMap<String, ValueCell>,
}

impl ValueRegistry {
    /// Create a registry whose locally originated writes are stamped with
    /// `source`.
    #[must_use]
    pub fn new(source: WriterSource) -> Self {
        Self {
            source,
            values: BTreeMap::new(),
        }
    }

    /// This process's writer identity.
    #[must_use]
    pub fn source(&self) -> &WriterSource {
        &self.source
    }

    /// Register a new cell for a serde-friendly type.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::DuplicateValue`] if the id is already taken.
    pub fn register<T: Serialize + DeserializeOwned + 'static>(
        &mut self,
        id: impl Into<String>,
        initial: T,
    ) -> Result<(), ValueError> {
        self.register_with_adapter(id, initial, SerdeAdapter::<T>::new())
    }

    /// Register a new cell with a custom type adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::DuplicateValue`] if the id is already taken.
    pub fn register_with_adapter<A: ValueTypeAdapter>(
        &mut self,
        id: impl Into<String>,
        initial: A::Value,
        adapter: A,
    ) -> Result<(), ValueError> {
        let id = id.into();
        if self.values.contains_key(&id) {
            return Err(ValueError::DuplicateValue(id));
        }
        self.values.insert(
            id,
            ValueCell {
                clock: 0,
                source: self.source.clone(),
                data: Box::new(initial),
                adapter: Rc::new(Erased(adapter)),
            },
        );
        Ok(())
    }

    /// Typed read of the current value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownValue`] for a missing id and
    /// [`ValueError::TypeMismatch`] if `T` is not the cell's stored type.
    pub fn get<T: 'static>(&self, id: &str) -> Result<&T, ValueError> {
        let cell = self
            .values
            .get(id)
            .ok_or_else(|| ValueError::UnknownValue(id.to_string()))?;
        cell.data
            .downcast_ref::<T>()
            .ok_or_else(|| ValueError::TypeMismatch(id.to_string()))
    }

    /// Local write: proposes `observed clock + 1`, stamps this registry's
    /// source, stores the value, and returns the mutation to broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownValue`], [`ValueError::TypeMismatch`], or
    /// [`ValueError::Adapter`] if the value cannot be converted for the wire.
    pub fn set<T: 'static>(&mut self, id: &str, value: T) -> Result<ValueMutation, ValueError> {
        let source = self.source.clone();
        let cell = self
            .values
            .get_mut(id)
            .ok_or_else(|| ValueError::UnknownValue(id.to_string()))?;
        if !cell.data.is::<T>() {
            return Err(ValueError::TypeMismatch(id.to_string()));
        }

        let data =
            cell.adapter
                .to_primitive(&value)
                .map_err(|message| ValueError::Adapter {
                    value_id: id.to_string(),
                    message,
                })?;

        cell.clock += 1;
        cell.source = source.clone();
        cell.data = Box::new(value);

        Ok(ValueMutation {
            value_id: id.to_string(),
            clock: cell.clock,
            source,
            data,
        })
    }

    /// Network receipt path: run conflict resolution and store the incoming
    /// value if it wins. Stale and outranked writes are silently dropped —
    /// they are protocol behaviour, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownValue`] for an unaddressable mutation and
    /// [`ValueError::Adapter`] if the payload is malformed. Either is fatal
    /// for this one message only.
    pub fn apply(&mut self, mutation: &ValueMutation) -> Result<Acceptance, ValueError> {
        let cell = self
            .values
            .get_mut(&mutation.value_id)
            .ok_or_else(|| ValueError::UnknownValue(mutation.value_id.clone()))?;

        let acceptance = resolve(cell.clock, &cell.source, mutation.clock, &mutation.source);
        match acceptance {
            Acceptance::Accepted => {
                let data = cell.adapter.from_primitive(&mutation.data).map_err(
                    |message| ValueError::Adapter {
                        value_id: mutation.value_id.clone(),
                        message,
                    },
                )?;
                cell.clock = mutation.clock;
                cell.source = mutation.source.clone();
                cell.data = data;
            }
            Acceptance::Stale | Acceptance::Outranked => {
                debug!(
                    value_id = mutation.value_id,
                    proposed_clock = mutation.clock,
                    current_clock = cell.clock,
                    source = %mutation.source,
                    outcome = ?acceptance,
                    "dropped conflicting write"
                );
            }
        }
        Ok(acceptance)
    }

    /// The cell's current logical clock.
    #[must_use]
    pub fn clock(&self, id: &str) -> Option<u32> {
        self.values.get(id).map(|c| c.clock)
    }

    /// The identity of the last accepted writer.
    #[must_use]
    pub fn last_source(&self, id: &str) -> Option<&WriterSource> {
        self.values.get(id).map(|c| &c.source)
    }

    /// Returns `true` if the id has a registered cell.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Remove a cell. Returns `true` if it existed.
    pub fn destroy(&mut self, id: &str) -> bool {
        self.values.remove(id).is_some()
    }

    /// Number of registered cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no cells are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Full-state snapshot for late joiners: one mutation per cell, carrying
    /// the cell's current clock and writer so receipt-side resolution applies
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Adapter`] if any cell cannot be converted.
    pub fn snapshot(&self) -> Result<Vec<ValueMutation>, ValueError> {
        self.values
            .iter()
            .map(|(id, cell)| {
                let data = cell.adapter.to_primitive(cell.data.as_ref()).map_err(
                    |message| ValueError::Adapter {
                        value_id: id.clone(),
                        message,
                    },
                )?;
                Ok(ValueMutation {
                    value_id: id.clone(),
                    clock: cell.clock,
                    source: cell.source.clone(),
                    data,
                })
            })
            .collect()
    }
}

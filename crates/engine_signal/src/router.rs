//! Listener table and dispatch.
//!
//! A [`SignalRouter`] belongs to exactly one receiver (an entity, the scene,
//! a value registry). Listeners are stored per signal `TypeId` and invoked in
//! registration order. Revocation is by [`ListenerHandle`]; a cleared router
//! silently drops subsequent fires, which is what makes destroying a receiver
//! mid-tick safe.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::signal::SignalOn;

/// Handle to a registered listener, used for deterministic revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    type_id: TypeId,
    token: u64,
}

/// A type-erased listener entry.
struct Listener {
    token: u64,
    callback: Box<dyn FnMut(&dyn Any)>,
}

/// Listener table for one receiver of scope `R`.
pub struct SignalRouter<R> {
    listeners: HashMap<TypeId, Vec<Listener>>,
    next_token: u64,
    _scope: PhantomData<R>,
}

impl<R: 'static> SignalRouter<R> {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_token: 1,
            _scope: PhantomData,
        }
    }

    /// Register a listener for signal type `S`.
    ///
    /// Listeners for the same signal type fire in registration order.
    pub fn on<S, F>(&mut self, mut f: F) -> ListenerHandle
    where
        S: SignalOn<R>,
        F: FnMut(&S) + 'static,
    {
        let token = self.next_token;
        self.next_token += 1;

        let callback = Box::new(move |any: &dyn Any| {
            if let Some(signal) = any.downcast_ref::<S>() {
                f(signal);
            }
        });

        let type_id = TypeId::of::<S>();
        self.listeners
            .entry(type_id)
            .or_default()
            .push(Listener { token, callback });

        ListenerHandle { type_id, token }
    }

    /// Remove a listener by handle.
    ///
    /// Returns `true` if the listener was still registered.
    pub fn unregister(&mut self, handle: ListenerHandle) -> bool {
        let Some(entries) = self.listeners.get_mut(&handle.type_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|l| l.token != handle.token);
        entries.len() != before
    }

    /// Fire a signal, invoking every listener registered for its type.
    pub fn fire<S: SignalOn<R>>(&mut self, signal: &S) {
        self.fire_boxed(TypeId::of::<S>(), signal);
    }

    /// Type-erased fire, used by deferred dispatch queues that hold boxed
    /// signals. `type_id` must be the `TypeId` of the concrete signal type.
    pub fn fire_boxed(&mut self, type_id: TypeId, signal: &dyn Any) {
        if let Some(entries) = self.listeners.get_mut(&type_id) {
            for listener in entries.iter_mut() {
                (listener.callback)(signal);
            }
        }
    }

    /// Number of listeners registered for signal type `S`.
    #[must_use]
    pub fn listener_count<S: SignalOn<R>>(&self) -> usize {
        self.listeners
            .get(&TypeId::of::<S>())
            .map_or(0, Vec::len)
    }

    /// Drop every listener. Fires after this are no-ops.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<R: 'static> Default for SignalRouter<R> {
    fn default() -> Self {
        Self::new()
    }
}

//! Position change observers

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::types::PositionChangeEvent;

type Callback = Rc<dyn Fn(&PositionChangeEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

/// Observer list for [`PositionChangeEvent`]s
#[derive(Default, Clone)]
pub struct Observers {
    registry: Rc<RefCell<Registry>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; keep the returned handle to unsubscribe
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PositionChangeEvent) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.push((id, Rc::new(callback)));

        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every subscriber, in subscription order
    pub fn emit(&self, event: &PositionChangeEvent) {
        // Snapshot so callbacks may dispose subscriptions while we iterate
        let callbacks: Vec<Callback> = self
            .registry
            .borrow()
            .callbacks
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        self.registry.borrow_mut().callbacks.clear();
    }
}

/// Handle returned by [`Observers::subscribe`]
///
/// Dropping the handle does not unsubscribe; call [`Subscription::dispose`].
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback. Returns false if it was already gone.
    pub fn dispose(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.borrow_mut();
        let before = registry.callbacks.len();
        registry.callbacks.retain(|(id, _)| *id != self.id);
        registry.callbacks.len() != before
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use crate::store::StoreSnapshot;

pub(crate) type Listener = Rc<dyn Fn(&StoreSnapshot)>;

/// Ordered listener registry.
///
/// Listeners are notified in registration order. Removing a listener while
/// a notification round is in flight is honored immediately (its slot is
/// skipped); listeners registered during a round are first invoked on the
/// next one.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    slots: RefCell<Vec<Option<Listener>>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, listener: Listener) -> usize {
        let mut slots = self.slots.borrow_mut();
        slots.push(Some(listener));
        slots.len() - 1
    }

    pub(crate) fn remove(&self, id: usize) {
        let mut slots = self.slots.borrow_mut();
        if let Some(slot) = slots.get_mut(id) {
            *slot = None;
        }
    }

    pub(crate) fn notify(&self, snapshot: &StoreSnapshot) {
        // Bound the round to the slots present at its start; each slot is
        // re-read per iteration so removals mid-round take effect.
        let round = self.slots.borrow().len();
        for index in 0..round {
            let listener = self
                .slots
                .borrow()
                .get(index)
                .and_then(|slot| slot.clone());
            if let Some(listener) = listener {
                listener(snapshot);
            }
        }
    }
}

/// RAII guard for a store subscription; dropping it removes the listener.
pub struct Subscription {
    registry: Rc<ObserverRegistry>,
    id: usize,
}

impl Subscription {
    pub(crate) fn new(registry: Rc<ObserverRegistry>, id: usize) -> Self {
        Self { registry, id }
    }

    /// Remove the listener now rather than at scope end.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use crate::registry::Subscription;
use crate::store::{StoreHandle, StoreSnapshot};

/// Per-consumer memoized derived value over store snapshots.
///
/// Recomputes the selected value on every store notification but retains
/// the previous value (and stays silent) unless it actually changed, so
/// downstream work only happens on real transitions.
pub struct Selector<T> {
    value: Rc<RefCell<T>>,
    _subscription: Subscription,
}

impl<T: Clone + PartialEq + 'static> Selector<T> {
    /// Derive a value from the store; `get` returns the latest distinct
    /// result.
    pub fn new(
        handle: &StoreHandle,
        select: impl Fn(&StoreSnapshot) -> T + 'static,
    ) -> Self {
        Self::with_on_change(handle, select, |_| {})
    }

    /// Like [`new`](Selector::new), additionally invoking `on_change`
    /// whenever the selected value transitions.
    pub fn with_on_change(
        handle: &StoreHandle,
        select: impl Fn(&StoreSnapshot) -> T + 'static,
        on_change: impl Fn(&T) + 'static,
    ) -> Self {
        let value = Rc::new(RefCell::new(select(&handle.snapshot())));
        let slot = Rc::clone(&value);
        let subscription = handle.subscribe(move |snapshot| {
            let next = select(snapshot);
            {
                let current = slot.borrow();
                if *current == next {
                    return;
                }
            }
            *slot.borrow_mut() = next;
            on_change(&slot.borrow());
        });

        Self {
            value,
            _subscription: subscription,
        }
    }

    /// Latest selected value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}

//! Listener lists for connection lifecycle events.
//!
//! Any number of listeners can be registered per event kind. Each
//! registration returns a [`ListenerHandle`]; removing it is idempotent
//! and safe from inside a listener.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::warn;

use crate::error::SessionError;

type Callback<A> = Rc<RefCell<dyn FnMut(&A)>>;

struct Slots<A> {
    next_id: u64,
    callbacks: IndexMap<u64, Callback<A>>,
}

/// Ordered list of callbacks taking `&A`.
pub struct Listeners<A: 'static> {
    slots: Rc<RefCell<Slots<A>>>,
}

impl<A: 'static> Default for Listeners<A> {
    fn default() -> Self {
        Listeners {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                callbacks: IndexMap::new(),
            })),
        }
    }
}

impl<A: 'static> Listeners<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, callback: F) -> ListenerHandle
    where
        F: FnMut(&A) + 'static,
    {
        let mut slots = self.slots.borrow_mut();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.callbacks.insert(id, Rc::new(RefCell::new(callback)));
        drop(slots);

        let weak: Weak<RefCell<Slots<A>>> = Rc::downgrade(&self.slots);
        ListenerHandle {
            remove: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().callbacks.shift_remove(&id);
                }
            })),
        }
    }

    /// Invoke every listener registered at the time of the call.
    ///
    /// Iterates a snapshot, so listeners may add or remove listeners.
    pub fn emit(&self, arg: &A) {
        let snapshot: Vec<Callback<A>> = self.slots.borrow().callbacks.values().cloned().collect();
        for cb in snapshot {
            match cb.try_borrow_mut() {
                Ok(mut f) => f(arg),
                Err(_) => warn!("listener re-entered while running; skipped"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removal handle for one registered listener.
///
/// Dropping the handle does **not** remove the listener; call
/// [`ListenerHandle::remove`].
pub struct ListenerHandle {
    remove: Option<Box<dyn FnOnce()>>,
}

impl ListenerHandle {
    pub fn remove(&mut self) {
        if let Some(f) = self.remove.take() {
            f();
        }
    }

    pub fn is_removed(&self) -> bool {
        self.remove.is_none()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// One list per lifecycle event kind.
#[derive(Default)]
pub struct SessionListeners {
    pub connect: Listeners<()>,
    pub disconnect: Listeners<()>,
    pub error: Listeners<SessionError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn every_listener_runs_in_registration_order() {
        let list: Listeners<u32> = Listeners::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s1 = seen.clone();
        let _a = list.add(move |v| s1.borrow_mut().push(("a", *v)));
        let s2 = seen.clone();
        let _b = list.add(move |v| s2.borrow_mut().push(("b", *v)));

        list.emit(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn remove_is_idempotent() {
        let list: Listeners<()> = Listeners::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut handle = list.add(move |_| h.set(h.get() + 1));

        handle.remove();
        handle.remove();
        assert!(handle.is_removed());
        assert!(list.is_empty());

        list.emit(&());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn listener_can_remove_itself_while_running() {
        let list: Listeners<()> = Listeners::new();
        let slot: Rc<RefCell<Option<ListenerHandle>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let (s, h) = (slot.clone(), hits.clone());
        let handle = list.add(move |_| {
            h.set(h.get() + 1);
            if let Some(mut me) = s.borrow_mut().take() {
                me.remove();
            }
        });
        *slot.borrow_mut() = Some(handle);

        list.emit(&());
        list.emit(&());
        assert_eq!(hits.get(), 1);
    }
}

//! A named-event publish/subscribe registry.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use pledge_core::{EventLoop, Promise};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Callback<A> = Rc<RefCell<dyn FnMut(&A)>>;

struct Listener<A> {
    id: ListenerId,
    once: bool,
    callback: Callback<A>,
}

/// Listeners keyed by event name, called in registration order.
///
/// [`emit`](EventEmitter::emit) works on a snapshot taken before the first
/// listener runs: listeners added during an emit wait for the next one, and
/// listeners removed during an emit still see the current payload.
pub struct EventEmitter<A> {
    listeners: RefCell<HashMap<String, Vec<Listener<A>>>>,
    next_id: Cell<u64>,
}

impl<A: 'static> EventEmitter<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnMut(&A) + 'static,
    {
        self.add(event.into(), false, Rc::new(RefCell::new(listener)))
    }

    /// Like [`on`](Self::on), but the listener is removed before its first call.
    pub fn once<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnOnce(&A) + 'static,
    {
        let mut listener = Some(listener);
        let callback = move |payload: &A| {
            if let Some(listener) = listener.take() {
                listener(payload);
            }
        };
        self.add(event.into(), true, Rc::new(RefCell::new(callback)))
    }

    fn add(&self, event: String, once: bool, callback: Callback<A>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        tracing::trace!(event = %event, listener = %id, once, "Listener added");
        self.listeners
            .borrow_mut()
            .entry(event)
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    /// Remove one listener. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|listener| listener.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Call every listener of `event` with `payload`. Returns how many ran.
    pub fn emit(&self, event: &str, payload: &A) -> usize {
        let snapshot: Vec<Callback<A>> = {
            let mut listeners = self.listeners.borrow_mut();
            let Some(list) = listeners.get_mut(event) else {
                tracing::trace!(event, "Emit with no listeners");
                return 0;
            };
            let snapshot = list
                .iter()
                .map(|listener| Rc::clone(&listener.callback))
                .collect();
            list.retain(|listener| !listener.once);
            if list.is_empty() {
                listeners.remove(event);
            }
            snapshot
        };

        let mut called = 0;
        for callback in &snapshot {
            match callback.try_borrow_mut() {
                Ok(mut callback) => {
                    (*callback)(payload);
                    called += 1;
                }
                Err(_) => tracing::warn!(event, "Skipping listener re-entered by its own emit"),
            }
        }
        called
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<A: Clone + 'static> EventEmitter<A> {
    /// A promise for the next payload emitted on `event`.
    pub fn next(&self, event_loop: &EventLoop, event: impl Into<String>) -> Promise<A> {
        let (promise, settler) = Promise::deferred(event_loop);
        self.once(event, move |payload: &A| settler.resolve(payload.clone()));
        promise
    }
}

impl<A: 'static> Default for EventEmitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventEmitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.borrow();
        let mut map = f.debug_map();
        for (event, list) in listeners.iter() {
            map.entry(event, &list.len());
        }
        map.finish()
    }
}

//! Trailing-edge debounce on the event loop's virtual clock.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use pledge_core::EventLoop;
use pledge_types::TimerId;

/// Collapses a burst of calls into one invocation with the last argument.
///
/// Every [`call`](Debounce::call) restarts the countdown. The callback runs
/// once `delay` has passed without another call.
pub struct Debounce<A> {
    inner: Rc<Inner<A>>,
}

struct Inner<A> {
    event_loop: EventLoop,
    delay: Duration,
    timer: Cell<Option<TimerId>>,
    callback: RefCell<Box<dyn FnMut(A)>>,
}

pub fn debounce<A, F>(event_loop: &EventLoop, delay: Duration, callback: F) -> Debounce<A>
where
    A: 'static,
    F: FnMut(A) + 'static,
{
    Debounce {
        inner: Rc::new(Inner {
            event_loop: event_loop.clone(),
            delay,
            timer: Cell::new(None),
            callback: RefCell::new(Box::new(callback)),
        }),
    }
}

impl<A: 'static> Debounce<A> {
    pub fn call(&self, arg: A) {
        let restarted = self.cancel();
        let inner = Rc::clone(&self.inner);
        let id = self
            .inner
            .event_loop
            .set_timeout(self.inner.delay, move || inner.fire(arg));
        self.inner.timer.set(Some(id));
        tracing::trace!(timer = %id, restarted, "Debounce armed");
    }

    /// Drop the pending invocation, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.inner.timer.take() {
            Some(id) => self.inner.event_loop.clear_timeout(id),
            None => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.timer.get().is_some()
    }
}

impl<A> Inner<A> {
    fn fire(&self, arg: A) {
        self.timer.set(None);
        match self.callback.try_borrow_mut() {
            Ok(mut callback) => (*callback)(arg),
            Err(_) => tracing::warn!("Debounced callback is already running, dropping call"),
        }
    }
}

impl<A> Clone for Debounce<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Debounce<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("delay", &self.inner.delay)
            .field("timer", &self.inner.timer.get())
            .finish_non_exhaustive()
    }
}

//! Rate limiting on the event loop's virtual clock.
//!
//! Two flavours:
//!
//! - [`throttle`] is leading-edge: a call runs immediately when at least
//!   `delay` has passed since the last run, otherwise it is dropped. The first
//!   window opens when the throttle is created.
//! - [`throttle_trailing`] is timer based: the first call in a window is
//!   scheduled to run after `delay` with its own argument, and every call
//!   made while that timer is pending is dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use pledge_core::EventLoop;
use pledge_types::TimerId;

pub struct Throttle<A> {
    event_loop: EventLoop,
    delay: Duration,
    last_run: Cell<Duration>,
    callback: RefCell<Box<dyn FnMut(A)>>,
}

pub fn throttle<A, F>(event_loop: &EventLoop, delay: Duration, callback: F) -> Throttle<A>
where
    F: FnMut(A) + 'static,
{
    Throttle {
        event_loop: event_loop.clone(),
        delay,
        last_run: Cell::new(event_loop.now()),
        callback: RefCell::new(Box::new(callback)),
    }
}

impl<A> Throttle<A> {
    /// Run the callback now if the window allows it. Returns whether it ran.
    pub fn call(&self, arg: A) -> bool {
        let now = self.event_loop.now();
        let elapsed = now.saturating_sub(self.last_run.get());
        if elapsed < self.delay {
            tracing::trace!(elapsed_ms = elapsed.as_millis() as u64, "Throttled call dropped");
            return false;
        }
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            tracing::warn!("Throttled callback is already running, dropping call");
            return false;
        };
        self.last_run.set(now);
        (*callback)(arg);
        true
    }

    /// Virtual time left until the next call would run.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let elapsed = self.event_loop.now().saturating_sub(self.last_run.get());
        self.delay.saturating_sub(elapsed)
    }
}

impl<A> fmt::Debug for Throttle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("delay", &self.delay)
            .field("last_run", &self.last_run.get())
            .finish_non_exhaustive()
    }
}

pub struct TrailingThrottle<A> {
    inner: Rc<TrailingInner<A>>,
}

struct TrailingInner<A> {
    event_loop: EventLoop,
    delay: Duration,
    timer: Cell<Option<TimerId>>,
    callback: RefCell<Box<dyn FnMut(A)>>,
}

pub fn throttle_trailing<A, F>(
    event_loop: &EventLoop,
    delay: Duration,
    callback: F,
) -> TrailingThrottle<A>
where
    A: 'static,
    F: FnMut(A) + 'static,
{
    TrailingThrottle {
        inner: Rc::new(TrailingInner {
            event_loop: event_loop.clone(),
            delay,
            timer: Cell::new(None),
            callback: RefCell::new(Box::new(callback)),
        }),
    }
}

impl<A: 'static> TrailingThrottle<A> {
    /// Schedule the callback unless a run is already pending. Returns whether
    /// this call was scheduled.
    pub fn call(&self, arg: A) -> bool {
        if self.is_pending() {
            tracing::trace!("Throttled call dropped while a run is pending");
            return false;
        }
        let inner = Rc::clone(&self.inner);
        let id = self
            .inner
            .event_loop
            .set_timeout(self.inner.delay, move || inner.fire(arg));
        self.inner.timer.set(Some(id));
        true
    }

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

impl<A> TrailingInner<A> {
    fn fire(&self, arg: A) {
        match self.callback.try_borrow_mut() {
            Ok(mut callback) => (*callback)(arg),
            Err(_) => tracing::warn!("Throttled callback is already running, dropping call"),
        }
        self.timer.set(None);
    }
}

impl<A> Clone for TrailingThrottle<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for TrailingThrottle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrailingThrottle")
            .field("delay", &self.inner.delay)
            .field("timer", &self.inner.timer.get())
            .finish_non_exhaustive()
    }
}

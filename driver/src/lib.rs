//! Drives a [`Coroutine`] to completion on an event loop.
//!
//! [`spawn`] runs the first step synchronously. Every `Await` is normalized
//! with [`Promise::from_resolution`] and observed through `then`; its value
//! (or reason) feeds the next step. The returned promise settles with the
//! coroutine's output, or with the reason of the first error it does not
//! recover from.

mod coroutine;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pledge_core::{EventLoop, Promise, Settler};

pub use coroutine::{Coroutine, FromFn, Resume, Suspend, from_fn};

/// Start `coroutine` and return a promise for its output.
pub fn spawn<C>(event_loop: &EventLoop, coroutine: C) -> Promise<C::Output>
where
    C: Coroutine + 'static,
{
    Promise::new(event_loop, |settler| {
        let driver = Rc::new(Driver {
            coroutine: RefCell::new(Some(coroutine)),
            settler,
            event_loop: event_loop.clone(),
            steps: Cell::new(0),
        });
        driver.step(Resume::Start);
    })
}

struct Driver<C: Coroutine> {
    /// Taken out while a step runs.
    coroutine: RefCell<Option<C>>,
    settler: Settler<C::Output>,
    event_loop: EventLoop,
    steps: Cell<u64>,
}

impl<C: Coroutine + 'static> Driver<C> {
    fn step(self: &Rc<Self>, input: Resume<C::Yield>) {
        let Some(mut coroutine) = self.coroutine.borrow_mut().take() else {
            tracing::trace!("Coroutine resumed while already running or finished");
            return;
        };
        self.steps.set(self.steps.get() + 1);

        match coroutine.resume(input) {
            Ok(Suspend::Await(resolution)) => {
                *self.coroutine.borrow_mut() = Some(coroutine);
                let awaited = Promise::from_resolution(&self.event_loop, resolution);
                tracing::trace!(
                    awaiting = %awaited.id(),
                    step = self.steps.get(),
                    "Coroutine suspended"
                );
                let on_value = {
                    let driver = Rc::clone(self);
                    move |value| driver.step(Resume::Next(value))
                };
                let driver = Rc::clone(self);
                awaited.then(on_value, move |reason| driver.step(Resume::Throw(reason)));
            }
            Ok(Suspend::Complete(output)) => {
                tracing::debug!(steps = self.steps.get(), "Coroutine completed");
                self.settler.resolve(output);
            }
            Err(reason) => {
                tracing::debug!(steps = self.steps.get(), reason = %reason, "Coroutine failed");
                self.settler.reject(reason);
            }
        }
    }
}

//! All-settled combinator: wait for every input, never reject.
//!
//! Each input's outcome is recorded as a [`Settled`] entry at its input index.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

use pledge_types::Settled;

use crate::{EventLoop, Promise, Resolution, Settler};

pub fn all_settled<T, I>(event_loop: &EventLoop, inputs: I) -> Promise<Vec<Settled<T>>>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = super::normalize(event_loop, inputs);
    Promise::new(event_loop, move |settler| {
        let total = inputs.len();
        if total == 0 {
            settler.resolve(Vec::new());
            return;
        }

        let tally = Rc::new(Tally {
            slots: RefCell::new(vec![None; total]),
            settled: Cell::new(0),
            settler,
        });
        for (index, input) in inputs.into_iter().enumerate() {
            let on_value = {
                let tally = Rc::clone(&tally);
                move |value| tally.record(index, Settled::Fulfilled { value })
            };
            let tally = Rc::clone(&tally);
            input.observe(on_value, move |reason| {
                tally.record(index, Settled::Rejected { reason });
            });
        }
    })
}

struct Tally<T> {
    slots: RefCell<Vec<Option<Settled<T>>>>,
    settled: Cell<usize>,
    settler: Settler<Vec<Settled<T>>>,
}

impl<T: Clone + 'static> Tally<T> {
    fn record(&self, index: usize, outcome: Settled<T>) {
        let total = {
            let mut slots = self.slots.borrow_mut();
            slots[index] = Some(outcome);
            slots.len()
        };
        self.settled.set(self.settled.get() + 1);
        if self.settled.get() == total {
            let slots = mem::take(&mut *self.slots.borrow_mut());
            self.settler.resolve(slots.into_iter().flatten().collect());
        }
    }
}

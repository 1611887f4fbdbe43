//! All combinator: every input must fulfil.
//!
//! The result fulfils with the values in input order, regardless of the order
//! in which the inputs settled. The first rejection rejects the result; later
//! settlements are ignored.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

use crate::{EventLoop, Promise, Resolution};

pub fn all<T, I>(event_loop: &EventLoop, inputs: I) -> Promise<Vec<T>>
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

        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; total]));
        let fulfilled = Rc::new(Cell::new(0usize));
        for (index, input) in inputs.into_iter().enumerate() {
            let on_value = {
                let settler = settler.clone();
                let slots = Rc::clone(&slots);
                let fulfilled = Rc::clone(&fulfilled);
                move |value: T| {
                    slots.borrow_mut()[index] = Some(value);
                    fulfilled.set(fulfilled.get() + 1);
                    if fulfilled.get() == total {
                        let values = mem::take(&mut *slots.borrow_mut());
                        settler.resolve(values.into_iter().flatten().collect());
                    }
                }
            };
            let settler = settler.clone();
            input.observe(on_value, move |reason| settler.reject(reason));
        }
    })
}

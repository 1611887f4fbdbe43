//! Any combinator: the first fulfilment wins.
//!
//! Rejections are collected at their input index. Only when every input has
//! rejected does the result reject, with an [`AggregateError`] holding all of
//! the reasons. An empty input rejects immediately.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

use pledge_types::{AggregateError, Reason};

use crate::{EventLoop, Promise, Resolution};

pub fn any<T, I>(event_loop: &EventLoop, inputs: I) -> Promise<T>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = super::normalize(event_loop, inputs);
    Promise::new(event_loop, move |settler| {
        let total = inputs.len();
        if total == 0 {
            settler.reject(AggregateError::new(Vec::new()));
            return;
        }

        let reasons: Rc<RefCell<Vec<Option<Reason>>>> = Rc::new(RefCell::new(vec![None; total]));
        let rejected = Rc::new(Cell::new(0usize));
        for (index, input) in inputs.into_iter().enumerate() {
            let on_value = {
                let settler = settler.clone();
                move |value| settler.resolve(value)
            };
            let settler = settler.clone();
            let reasons = Rc::clone(&reasons);
            let rejected = Rc::clone(&rejected);
            input.observe(on_value, move |reason| {
                reasons.borrow_mut()[index] = Some(reason);
                rejected.set(rejected.get() + 1);
                if rejected.get() == total {
                    let reasons = mem::take(&mut *reasons.borrow_mut());
                    settler.reject(AggregateError::new(reasons.into_iter().flatten().collect()));
                }
            });
        }
    })
}

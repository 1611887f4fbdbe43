//! Race combinator: the first input to settle decides the outcome.
//!
//! Fulfilment and rejection compete equally. Inputs that were already settled
//! when the race started are observed in input order, so the earliest of them
//! wins. With no inputs the result never settles.

use crate::{EventLoop, Promise, Resolution};

pub fn race<T, I>(event_loop: &EventLoop, inputs: I) -> Promise<T>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = super::normalize(event_loop, inputs);
    if inputs.is_empty() {
        tracing::debug!("Race over no inputs will never settle");
    }
    Promise::new(event_loop, move |settler| {
        for input in inputs {
            let on_value = {
                let settler = settler.clone();
                move |value| settler.resolve(value)
            };
            let settler = settler.clone();
            input.observe(on_value, move |reason| settler.reject(reason));
        }
    })
}

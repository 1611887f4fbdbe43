//! Combinators over collections of promises.
//!
//! - [`all`]: fulfil with every value in input order, or fail fast
//! - [`race`]: settle like whichever input settles first
//! - [`all_settled`]: wait for every input and report each outcome
//! - [`any`]: fulfil with the first value, or reject once every input has
//!
//! Inputs are anything convertible into a [`Resolution`]: promises, foreign
//! thenables, `Result`s or explicit `Resolution`s. Each input is normalized
//! into a promise before the combinator subscribes to it.
//!
//! # Empty inputs
//!
//! | Combinator | Result for `[]` |
//! |---|---|
//! | `all` | fulfils with `vec![]` |
//! | `all_settled` | fulfils with `vec![]` |
//! | `any` | rejects with an empty [`AggregateError`](pledge_types::AggregateError) |
//! | `race` | stays pending |

pub mod all;
pub mod all_settled;
pub mod any;
pub mod race;

pub use all::all;
pub use all_settled::all_settled;
pub use any::any;
pub use race::race;

use pledge_types::Settled;

use crate::{EventLoop, Promise, Resolution};

fn normalize<T, I>(event_loop: &EventLoop, inputs: I) -> Vec<Promise<T>>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    inputs
        .into_iter()
        .map(|input| Promise::from_resolution(event_loop, input))
        .collect()
}

impl<T: Clone + 'static> Promise<T> {
    /// See [`all()`].
    pub fn all<I>(event_loop: &EventLoop, inputs: I) -> Promise<Vec<T>>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        all(event_loop, inputs)
    }

    /// See [`race()`].
    pub fn race<I>(event_loop: &EventLoop, inputs: I) -> Promise<T>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        race(event_loop, inputs)
    }

    /// See [`all_settled()`].
    pub fn all_settled<I>(event_loop: &EventLoop, inputs: I) -> Promise<Vec<Settled<T>>>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        all_settled(event_loop, inputs)
    }

    /// See [`any()`].
    pub fn any<I>(event_loop: &EventLoop, inputs: I) -> Promise<T>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        any(event_loop, inputs)
    }
}

//! Resumable computations that suspend on promise-like values.

use std::fmt;
use std::marker::PhantomData;

use pledge_core::Resolution;
use pledge_types::Reason;

/// What a suspended computation is resumed with.
#[derive(Debug, Clone)]
pub enum Resume<T> {
    /// First step; nothing has been awaited yet.
    Start,
    /// The awaited value fulfilled.
    Next(T),
    /// The awaited value rejected. The computation may recover or propagate.
    Throw(Reason),
}

/// Where a computation stopped after a step.
pub enum Suspend<T, O> {
    Await(Resolution<T>),
    Complete(O),
}

impl<T, O> Suspend<T, O> {
    /// Suspend on anything convertible into a resolution.
    pub fn awaiting(value: impl Into<Resolution<T>>) -> Self {
        Self::Await(value.into())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

impl<T: fmt::Debug, O: fmt::Debug> fmt::Debug for Suspend<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Await(resolution) => f.debug_tuple("Await").field(resolution).finish(),
            Self::Complete(output) => f.debug_tuple("Complete").field(output).finish(),
        }
    }
}

/// A computation that can be stepped until it completes.
///
/// Each call to [`resume`](Coroutine::resume) runs until the next suspension
/// point. Returning `Err` ends the computation with that reason.
pub trait Coroutine {
    type Yield: Clone + 'static;
    type Output: Clone + 'static;

    fn resume(
        &mut self,
        input: Resume<Self::Yield>,
    ) -> Result<Suspend<Self::Yield, Self::Output>, Reason>;
}

/// A [`Coroutine`] built from a closure. See [`from_fn`].
pub struct FromFn<F, Y, O> {
    step: F,
    _marker: PhantomData<fn() -> (Y, O)>,
}

/// Adapt a stepping closure into a [`Coroutine`].
///
/// The closure keeps its own state between steps, typically a small state
/// machine over a captured counter or enum.
pub fn from_fn<Y, O, F>(step: F) -> FromFn<F, Y, O>
where
    F: FnMut(Resume<Y>) -> Result<Suspend<Y, O>, Reason>,
{
    FromFn {
        step,
        _marker: PhantomData,
    }
}

impl<F, Y, O> Coroutine for FromFn<F, Y, O>
where
    Y: Clone + 'static,
    O: Clone + 'static,
    F: FnMut(Resume<Y>) -> Result<Suspend<Y, O>, Reason>,
{
    type Yield = Y;
    type Output = O;

    fn resume(&mut self, input: Resume<Y>) -> Result<Suspend<Y, O>, Reason> {
        (self.step)(input)
    }
}

impl<F, Y, O> fmt::Debug for FromFn<F, Y, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

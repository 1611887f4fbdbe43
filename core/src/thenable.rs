//! The promise-like capability and what a promise can be resolved with.

use std::fmt;

use pledge_types::Reason;

use crate::Promise;

/// Anything that will eventually call back with a value or a reason.
///
/// Promises accept any `Thenable` wherever they accept another promise, so
/// foreign promise-like types can be assimilated. Implementations should call
/// exactly one callback at most once; extra calls are ignored by the
/// assimilating promise.
pub trait Thenable<T> {
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(Reason)>,
    );

    /// The concrete promise behind this thenable, if there is one.
    ///
    /// Used to pass promises through unchanged and to detect chaining cycles.
    fn as_promise(&self) -> Option<&Promise<T>> {
        None
    }
}

/// What a settler or a transformer hands back.
///
/// `Ok`/`Err` results, promises and `()` convert into a resolution, so
/// transformers can return whichever is natural.
pub enum Resolution<T> {
    Fulfill(T),
    Reject(Reason),
    /// Follow another promise-like value and settle the way it settles.
    Adopt(Box<dyn Thenable<T>>),
}

impl<T> Resolution<T> {
    pub fn adopt<P>(thenable: P) -> Self
    where
        P: Thenable<T> + 'static,
    {
        Self::Adopt(Box::new(thenable))
    }

    pub fn reject(reason: impl Into<Reason>) -> Self {
        Self::Reject(reason.into())
    }
}

impl<T, E> From<Result<T, E>> for Resolution<T>
where
    E: Into<Reason>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Resolution::Fulfill(value),
            Err(err) => Resolution::Reject(err.into()),
        }
    }
}

impl<T: Clone + 'static> From<Promise<T>> for Resolution<T> {
    fn from(promise: Promise<T>) -> Self {
        Resolution::Adopt(Box::new(promise))
    }
}

impl From<()> for Resolution<()> {
    fn from((): ()) -> Self {
        Resolution::Fulfill(())
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Fulfill(value) => f.debug_tuple("Fulfill").field(value).finish(),
            Resolution::Reject(reason) => f.debug_tuple("Reject").field(reason).finish(),
            Resolution::Adopt(thenable) => match thenable.as_promise() {
                Some(promise) => f.debug_tuple("Adopt").field(&promise.id()).finish(),
                None => f.write_str("Adopt(..)"),
            },
        }
    }
}

//! Failure reasons carried by rejected promises.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::PromiseId;

/// Why a promise was rejected.
///
/// A reason is delivered to every rejection continuation of a promise, so it
/// has to be cheap to clone: the underlying [`anyhow::Error`] is shared behind
/// an `Arc`. Any `std::error::Error` converts into a `Reason`, and the original
/// error can be recovered with [`Reason::downcast_ref`].
///
/// `Reason` deliberately does not implement `std::error::Error` itself, which
/// keeps the blanket `From<E: Error>` conversion coherent.
#[derive(Clone)]
pub struct Reason(Arc<anyhow::Error>);

impl Reason {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::new(error)))
    }

    /// A reason carrying only a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    #[must_use]
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    #[must_use]
    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.is::<E>()
    }

    /// Whether both handles share the same underlying error.
    #[must_use]
    pub fn ptr_eq(&self, other: &Reason) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.0
    }
}

impl<E> From<E> for Reason
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Every input of an `any` combinator rejected.
///
/// `errors` is index-aligned with the inputs.
#[derive(Debug, Clone, Error)]
#[error("all {} promises were rejected", .errors.len())]
pub struct AggregateError {
    errors: Vec<Reason>,
}

impl AggregateError {
    #[must_use]
    pub fn new(errors: Vec<Reason>) -> Self {
        Self { errors }
    }

    #[must_use]
    pub fn errors(&self) -> &[Reason] {
        &self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<Reason> {
        self.errors
    }
}

/// A promise was resolved with itself, directly or through a chain of
/// promises that are all waiting on each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("chaining cycle detected for promise #{promise}")]
pub struct ChainCycle {
    pub promise: PromiseId,
}

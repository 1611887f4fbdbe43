use std::fmt;

use serde::Serialize;

use crate::Reason;

/// Settlement status of a promise.
///
/// `Fulfilled` and `Rejected` are terminal: a promise never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Fulfilled,
    Rejected,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Fulfilled => "fulfilled",
            Status::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an `all_settled` result.
///
/// Serializes as `{"status": "fulfilled", "value": ..}` or
/// `{"status": "rejected", "reason": ".."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T> {
    Fulfilled { value: T },
    Rejected { reason: Reason },
}

impl<T> Settled<T> {
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Settled::Fulfilled { .. } => Status::Fulfilled,
            Settled::Rejected { .. } => Status::Rejected,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled { value } => Some(value),
            Settled::Rejected { .. } => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Settled::Fulfilled { .. } => None,
            Settled::Rejected { reason } => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<T, Reason> {
        match self {
            Settled::Fulfilled { value } => Ok(value),
            Settled::Rejected { reason } => Err(reason),
        }
    }
}

impl<T> From<Result<T, Reason>> for Settled<T> {
    fn from(result: Result<T, Reason>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled { value },
            Err(reason) => Settled::Rejected { reason },
        }
    }
}

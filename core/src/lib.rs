//! Single-threaded promises driven by an explicit event loop.
//!
//! Everything here runs on one thread. Work is queued on an [`EventLoop`] and
//! executed one task per turn; promises never settle or run continuations
//! synchronously, only on a later turn.
//!
//! ```
//! use pledge_core::{EventLoop, Promise};
//!
//! let event_loop = EventLoop::new();
//! let doubled = Promise::resolve(&event_loop, 21).map(|n| n * 2);
//! assert!(doubled.is_pending());
//!
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(doubled.value(), Some(42));
//! ```

pub mod combinator;
mod event_loop;
mod promise;
mod thenable;

pub use combinator::{all, all_settled, any, race};
pub use event_loop::{EventLoop, LoopError, RunReport, UnhandledRejection};
pub use promise::{Promise, Settler};
pub use thenable::{Resolution, Thenable};

pub use pledge_types::{AggregateError, ChainCycle, PromiseId, Reason, Settled, Status, TimerId};

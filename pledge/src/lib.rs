//! Deterministic single-threaded promises.
//!
//! This crate re-exports the pledge workspace:
//!
//! - **core**: [`EventLoop`], [`Promise`], [`Settler`], the [`Thenable`]
//!   capability and the [`combinator`]s
//! - **driver**: step a [`Coroutine`] to completion with [`spawn`]
//! - **utils**: [`debounce()`], [`throttle()`], [`throttle_trailing()`] and
//!   [`EventEmitter`]
//! - **config**: [`LoopConfig`] from `~/.pledge/config.toml` and `PLEDGE_*`
//!   environment variables
//!
//! ```
//! use pledge::prelude::*;
//!
//! let event_loop = EventLoop::new();
//! let inputs = vec![
//!     Promise::resolve(&event_loop, 1),
//!     Promise::resolve(&event_loop, 2),
//! ];
//! let total = Promise::<i32>::all(&event_loop, inputs).map(|values| values.iter().sum::<i32>());
//!
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(total.value(), Some(3));
//! ```

pub use pledge_config::{
    ConfigError, LoopConfig, MAX_TURNS_ENV, UNHANDLED_REJECTIONS_ENV, UnhandledRejections,
    config_path,
};
pub use pledge_core::{
    AggregateError, ChainCycle, EventLoop, LoopError, Promise, PromiseId, Reason, Resolution,
    RunReport, Settled, Settler, Status, Thenable, TimerId, UnhandledRejection, all, all_settled,
    any, combinator, race,
};
pub use pledge_driver::{Coroutine, FromFn, Resume, Suspend, from_fn, spawn};
pub use pledge_utils::{
    Debounce, EventEmitter, ListenerId, Throttle, TrailingThrottle, debounce, throttle,
    throttle_trailing,
};

/// The types most programs need.
pub mod prelude {
    pub use crate::{
        Coroutine, EventLoop, Promise, Reason, Resolution, Resume, Settled, Settler, Status,
        Suspend, Thenable,
    };
}

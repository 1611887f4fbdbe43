//! Timing and event helpers built on the pledge event loop.
//!
//! - **`debounce`**: run once after a quiet period, with the last argument
//! - **`throttle`**: leading-edge and trailing (timer) rate limiting
//! - **`events`**: named-event emitter with a promise-returning `next`
//!
//! All timing uses the loop's virtual clock, so behaviour is deterministic
//! under `EventLoop::advance`.

pub mod debounce;
pub mod events;
pub mod throttle;

pub use debounce::{Debounce, debounce};
pub use events::{EventEmitter, ListenerId};
pub use throttle::{Throttle, TrailingThrottle, throttle, throttle_trailing};

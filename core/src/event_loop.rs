//! Cooperative single-threaded event loop.
//!
//! The loop owns a FIFO queue of tasks and a set of timers keyed on a virtual
//! clock. Nothing runs until the owner drives the loop with [`EventLoop::turn`],
//! [`EventLoop::run_until_stalled`], [`EventLoop::run_until_idle`] or
//! [`EventLoop::advance`]. Time only moves when the loop is driven, so timer
//! behavior is fully deterministic.
//!
//! ```text
//! run_until_idle():
//!   loop:
//!     drain task queue (FIFO, tasks may enqueue more tasks)
//!     if no timer is left: break
//!     jump clock to the earliest deadline, fire that timer
//!   report unhandled rejections
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use pledge_config::{LoopConfig, UnhandledRejections};
use pledge_types::{PromiseId, Reason, TimerId};
use thiserror::Error;

type Task = Box<dyn FnOnce()>;
type RejectionHook = Rc<dyn Fn(&UnhandledRejection)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("event loop exhausted its budget of {limit} turns")]
    TurnBudgetExhausted { limit: u64 },
}

/// A rejected promise that had no rejection continuation when the loop went idle.
#[derive(Debug, Clone)]
pub struct UnhandledRejection {
    pub promise: PromiseId,
    pub reason: Reason,
}

/// Summary of a single `run_*` / `advance` call.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Tasks and timers executed.
    pub turns: u64,
    pub timers_fired: u64,
    pub unhandled: Vec<UnhandledRejection>,
}

impl RunReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unhandled.is_empty()
    }
}

struct TrackedRejection {
    promise: PromiseId,
    reason: Reason,
    handled: Rc<Cell<bool>>,
}

struct Inner {
    config: LoopConfig,
    tasks: RefCell<VecDeque<Task>>,
    timers: RefCell<BTreeMap<(Duration, TimerId), Task>>,
    deadlines: RefCell<HashMap<TimerId, Duration>>,
    now: Cell<Duration>,
    next_timer: Cell<u64>,
    next_promise: Cell<u64>,
    rejections: RefCell<Vec<TrackedRejection>>,
    hook: RefCell<Option<RejectionHook>>,
}

/// Handle to an event loop. Clones share the same loop.
///
/// Queued tasks and timers usually hold promises, and promises hold a handle
/// to their loop. Dropping every handle while work is still queued therefore
/// keeps that work alive; call [`EventLoop::clear`] first to discard it.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<Inner>,
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// A loop configured from `~/.pledge/config.toml` and `PLEDGE_*` variables.
    #[must_use]
    pub fn from_user_config() -> Self {
        Self::with_config(LoopConfig::resolve())
    }

    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                tasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(BTreeMap::new()),
                deadlines: RefCell::new(HashMap::new()),
                now: Cell::new(Duration::ZERO),
                next_timer: Cell::new(0),
                next_promise: Cell::new(0),
                rejections: RefCell::new(Vec::new()),
                hook: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Virtual time elapsed since the loop was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_tasks() == 0 && self.pending_timers() == 0
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &EventLoop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queue `task` to run on a later turn, after everything already queued.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run `task` once the virtual clock reaches `now() + delay`.
    pub fn set_timeout<F>(&self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let id = TimerId::new(self.inner.next_timer.get());
        self.inner.next_timer.set(id.value() + 1);
        let deadline = self.now().saturating_add(delay);
        self.inner
            .timers
            .borrow_mut()
            .insert((deadline, id), Box::new(task));
        self.inner.deadlines.borrow_mut().insert(id, deadline);
        tracing::trace!(timer = %id, deadline_ms = deadline.as_millis() as u64, "Timer scheduled");
        id
    }

    /// Cancel a timer. Returns `false` if it already fired or was cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let Some(deadline) = self.inner.deadlines.borrow_mut().remove(&id) else {
            return false;
        };
        let removed = self.inner.timers.borrow_mut().remove(&(deadline, id));
        removed.is_some()
    }

    /// Discard every queued task, timer and tracked rejection.
    ///
    /// Promises waiting on the discarded work stay pending. Returns how many
    /// tasks and timers were dropped.
    pub fn clear(&self) -> usize {
        let tasks = mem::take(&mut *self.inner.tasks.borrow_mut());
        let timers = mem::take(&mut *self.inner.timers.borrow_mut());
        self.inner.deadlines.borrow_mut().clear();
        self.inner.rejections.borrow_mut().clear();
        let dropped = tasks.len() + timers.len();
        tracing::debug!(dropped, "Event loop cleared");
        drop(tasks);
        drop(timers);
        dropped
    }

    /// Install the side-channel hook called for every unhandled rejection.
    pub fn on_unhandled_rejection<F>(&self, hook: F)
    where
        F: Fn(&UnhandledRejection) + 'static,
    {
        *self.inner.hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Run the next queued task, if any. Timers are not considered.
    pub fn turn(&self) -> bool {
        let task = self.inner.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run queued tasks until the queue is empty. Timers do not fire.
    pub fn run_until_stalled(&self) -> Result<RunReport, LoopError> {
        let mut report = RunReport::default();
        self.drain(&mut report)?;
        Ok(self.finish(report))
    }

    /// Run tasks and timers until nothing is left to do.
    ///
    /// The clock jumps straight to each timer's deadline.
    pub fn run_until_idle(&self) -> Result<RunReport, LoopError> {
        let mut report = RunReport::default();
        loop {
            self.drain(&mut report)?;
            if !self.fire_next_timer(None, &mut report)? {
                break;
            }
        }
        Ok(self.finish(report))
    }

    /// Move the clock forward by `by`, firing due timers and draining tasks
    /// in between. The clock ends exactly `by` later.
    pub fn advance(&self, by: Duration) -> Result<RunReport, LoopError> {
        let target = self.now().saturating_add(by);
        let mut report = RunReport::default();
        loop {
            self.drain(&mut report)?;
            if !self.fire_next_timer(Some(target), &mut report)? {
                break;
            }
        }
        self.inner.now.set(target);
        Ok(self.finish(report))
    }

    pub(crate) fn next_promise_id(&self) -> PromiseId {
        let id = PromiseId::new(self.inner.next_promise.get());
        self.inner.next_promise.set(id.value() + 1);
        id
    }

    /// Remember a rejection that had no observer when it happened.
    ///
    /// `handled` is flipped by the promise if a continuation shows up later.
    pub(crate) fn track_rejection(
        &self,
        promise: PromiseId,
        reason: Reason,
        handled: Rc<Cell<bool>>,
    ) {
        self.inner.rejections.borrow_mut().push(TrackedRejection {
            promise,
            reason,
            handled,
        });
    }

    fn spend_turn(&self, report: &mut RunReport) -> Result<(), LoopError> {
        if let Some(limit) = self.inner.config.turn_budget()
            && report.turns >= limit
        {
            tracing::warn!(limit, "Event loop turn budget exhausted");
            return Err(LoopError::TurnBudgetExhausted { limit });
        }
        report.turns += 1;
        Ok(())
    }

    fn drain(&self, report: &mut RunReport) -> Result<(), LoopError> {
        while self.pending_tasks() > 0 {
            self.spend_turn(report)?;
            self.turn();
        }
        Ok(())
    }

    fn fire_next_timer(
        &self,
        limit: Option<Duration>,
        report: &mut RunReport,
    ) -> Result<bool, LoopError> {
        let next = self.inner.timers.borrow().keys().next().copied();
        let Some((deadline, id)) = next else {
            return Ok(false);
        };
        if limit.is_some_and(|limit| deadline > limit) {
            return Ok(false);
        }
        self.spend_turn(report)?;

        let task = self.inner.timers.borrow_mut().remove(&(deadline, id));
        self.inner.deadlines.borrow_mut().remove(&id);
        let Some(task) = task else {
            return Ok(false);
        };
        if deadline > self.now() {
            self.inner.now.set(deadline);
        }
        report.timers_fired += 1;
        tracing::trace!(timer = %id, now_ms = deadline.as_millis() as u64, "Timer fired");
        task();
        Ok(true)
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        let tracked = mem::take(&mut *self.inner.rejections.borrow_mut());
        let hook = self.inner.hook.borrow().clone();
        let warn = matches!(
            self.inner.config.unhandled_rejections,
            UnhandledRejections::Warn
        );

        for rejection in tracked {
            if rejection.handled.get() {
                continue;
            }
            let unhandled = UnhandledRejection {
                promise: rejection.promise,
                reason: rejection.reason,
            };
            if warn {
                tracing::warn!(
                    promise = %unhandled.promise,
                    reason = %unhandled.reason,
                    "Unhandled promise rejection"
                );
            }
            if let Some(hook) = &hook {
                hook(&unhandled);
            }
            report.unhandled.push(unhandled);
        }

        tracing::debug!(
            turns = report.turns,
            timers_fired = report.timers_fired,
            unhandled = report.unhandled.len(),
            now_ms = self.now().as_millis() as u64,
            "Event loop run finished"
        );
        report
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("pending_tasks", &self.pending_tasks())
            .field("pending_timers", &self.pending_timers())
            .finish_non_exhaustive()
    }
}

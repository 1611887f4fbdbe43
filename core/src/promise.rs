//! The settlement state machine and the chaining operator.
//!
//! A [`Promise`] starts pending and settles at most once. Settling is split in
//! two halves:
//!
//! 1. A [`Settler`] call *claims* the promise synchronously. The first claim
//!    wins; every later call on any settler of that promise is ignored.
//! 2. The state change itself, and the draining of the continuation queue,
//!    runs on a later turn of the [`EventLoop`].
//!
//! Continuations therefore never run inside the initializer or inside `then`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ptr;
use std::rc::{Rc, Weak};

use pledge_types::{ChainCycle, PromiseId, Reason, Status};

use crate::{EventLoop, Resolution, Thenable};

type OnFulfilled<T> = Box<dyn FnOnce(T)>;
type OnRejected = Box<dyn FnOnce(Reason)>;

enum State<T> {
    Pending {
        on_fulfilled: VecDeque<OnFulfilled<T>>,
        on_rejected: VecDeque<OnRejected>,
    },
    Fulfilled(T),
    Rejected(Reason),
}

struct Shared<T> {
    id: PromiseId,
    event_loop: EventLoop,
    state: RefCell<State<T>>,
    claimed: Cell<bool>,
    /// Set once any rejection continuation has been registered.
    handled: Rc<Cell<bool>>,
    /// The promise currently being adopted, for cycle detection.
    following: RefCell<Option<Weak<Shared<T>>>>,
    /// Hands a still-pending queue to [`release`] on drop.
    park: fn(&mut State<T>),
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        (self.park)(self.state.get_mut());
    }
}

thread_local! {
    static RELEASED: RefCell<Vec<Box<dyn Any>>> = const { RefCell::new(Vec::new()) };
    static RELEASING: Cell<bool> = const { Cell::new(false) };
}

fn park_queues<T: 'static>(state: &mut State<T>) {
    if let State::Pending {
        on_fulfilled,
        on_rejected,
    } = state
        && !(on_fulfilled.is_empty() && on_rejected.is_empty())
    {
        release(Box::new((mem::take(on_fulfilled), mem::take(on_rejected))));
    }
}

/// Drop continuation queues one at a time.
///
/// A queued continuation owns the settler of its derived promise, whose queue
/// owns the next continuation. Dropping an unsettled chain inline would recurse
/// once per link, so nested drops only push onto the list and the outermost
/// call empties it.
fn release(garbage: Box<dyn Any>) {
    let queued = RELEASED.try_with(|released| released.borrow_mut().push(garbage));
    if queued.is_err() || RELEASING.try_with(|flag| flag.replace(true)).unwrap_or(true) {
        return;
    }
    while let Some(next) = RELEASED.with_borrow_mut(Vec::pop) {
        drop(next);
    }
    RELEASING.set(false);
}

impl<T> Shared<T> {
    fn status(&self) -> Status {
        match &*self.state.borrow() {
            State::Pending { .. } => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }
}

impl<T: Clone + 'static> Shared<T> {
    fn schedule(self: &Rc<Self>, outcome: Result<T, Reason>) {
        let shared = Rc::clone(self);
        self.event_loop.defer(move || shared.transition(outcome));
    }

    fn transition(&self, outcome: Result<T, Reason>) {
        let (on_fulfilled, on_rejected) = {
            let mut state = self.state.borrow_mut();
            let State::Pending {
                on_fulfilled,
                on_rejected,
            } = &mut *state
            else {
                tracing::trace!(promise = %self.id, "Promise already settled, dropping outcome");
                return;
            };
            let queues = (mem::take(on_fulfilled), mem::take(on_rejected));
            *state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            queues
        };
        self.following.borrow_mut().take();

        match outcome {
            Ok(value) => {
                tracing::trace!(
                    promise = %self.id,
                    continuations = on_fulfilled.len(),
                    "Promise fulfilled"
                );
                drop(on_rejected);
                for continuation in on_fulfilled {
                    continuation(value.clone());
                }
            }
            Err(reason) => {
                tracing::trace!(
                    promise = %self.id,
                    continuations = on_rejected.len(),
                    reason = %reason,
                    "Promise rejected"
                );
                if on_rejected.is_empty() && !self.handled.get() {
                    self.event_loop.track_rejection(
                        self.id,
                        reason.clone(),
                        Rc::clone(&self.handled),
                    );
                }
                drop(on_fulfilled);
                for continuation in on_rejected {
                    continuation(reason.clone());
                }
            }
        }
    }

    fn follow(self: &Rc<Self>, thenable: Box<dyn Thenable<T>>) {
        if let Some(target) = thenable.as_promise() {
            if self.reaches(&target.shared) {
                tracing::debug!(promise = %self.id, "Chaining cycle detected");
                self.schedule(Err(Reason::new(ChainCycle { promise: self.id })));
                return;
            }
            *self.following.borrow_mut() = Some(Rc::downgrade(&target.shared));
        }

        let shared = Rc::clone(self);
        self.event_loop.defer(move || {
            let done = Rc::new(Cell::new(false));
            let on_fulfilled: OnFulfilled<T> = {
                let shared = Rc::clone(&shared);
                let done = Rc::clone(&done);
                Box::new(move |value| {
                    if !done.replace(true) {
                        shared.schedule(Ok(value));
                    }
                })
            };
            let on_rejected: OnRejected = Box::new(move |reason| {
                if !done.replace(true) {
                    shared.schedule(Err(reason));
                }
            });
            thenable.subscribe(on_fulfilled, on_rejected);
        });
    }

    /// Whether walking the adoption chain from `target` arrives back here.
    fn reaches(&self, target: &Rc<Shared<T>>) -> bool {
        let mut cursor = Some(Rc::clone(target));
        while let Some(node) = cursor {
            if ptr::eq(Rc::as_ptr(&node), self) {
                return true;
            }
            cursor = node.following.borrow().as_ref().and_then(Weak::upgrade);
        }
        false
    }
}

/// The write half of a promise, handed to initializers.
///
/// All clones of a settler share one claim: whichever call comes first wins.
pub struct Settler<T> {
    shared: Rc<Shared<T>>,
}

impl<T: Clone + 'static> Settler<T> {
    pub fn resolve(&self, value: T) {
        self.settle(Resolution::Fulfill(value));
    }

    pub fn reject(&self, reason: impl Into<Reason>) {
        self.settle(Resolution::Reject(reason.into()));
    }

    /// Settle the same way `thenable` eventually settles.
    pub fn adopt<P>(&self, thenable: P)
    where
        P: Thenable<T> + 'static,
    {
        self.settle(Resolution::Adopt(Box::new(thenable)));
    }

    pub fn settle(&self, resolution: impl Into<Resolution<T>>) {
        let shared = &self.shared;
        if shared.claimed.replace(true) {
            tracing::trace!(promise = %shared.id, "Ignoring settle on an already claimed promise");
            return;
        }
        match resolution.into() {
            Resolution::Fulfill(value) => shared.schedule(Ok(value)),
            Resolution::Reject(reason) => shared.schedule(Err(reason)),
            Resolution::Adopt(thenable) => shared.follow(thenable),
        }
    }
}

impl<T> Settler<T> {
    /// Whether some settler call has already claimed the promise.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.shared.claimed.get()
    }

    #[must_use]
    pub fn promise(&self) -> Promise<T> {
        Promise {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Settler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("promise", &self.shared.id)
            .field("claimed", &self.shared.claimed.get())
            .finish()
    }
}

/// A value that becomes available on a later turn of an [`EventLoop`].
///
/// Handles are cheap to clone; all clones observe the same settlement.
pub struct Promise<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Promise<T> {
    #[must_use]
    pub fn id(&self) -> PromiseId {
        self.shared.id
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.shared.event_loop
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone + 'static> Promise<T> {
    fn pending(event_loop: &EventLoop) -> Self {
        Self {
            shared: Rc::new(Shared {
                id: event_loop.next_promise_id(),
                event_loop: event_loop.clone(),
                state: RefCell::new(State::Pending {
                    on_fulfilled: VecDeque::new(),
                    on_rejected: VecDeque::new(),
                }),
                claimed: Cell::new(false),
                handled: Rc::new(Cell::new(false)),
                following: RefCell::new(None),
                park: park_queues::<T>,
            }),
        }
    }

    /// Create a promise and run `initializer` with its settler right away.
    pub fn new<F>(event_loop: &EventLoop, initializer: F) -> Self
    where
        F: FnOnce(Settler<T>),
    {
        let promise = Self::pending(event_loop);
        initializer(Settler {
            shared: Rc::clone(&promise.shared),
        });
        promise
    }

    /// Like [`Promise::new`], but an `Err` from the initializer rejects the
    /// promise (unless the initializer already settled it).
    pub fn try_new<F, E>(event_loop: &EventLoop, initializer: F) -> Self
    where
        F: FnOnce(Settler<T>) -> Result<(), E>,
        E: Into<Reason>,
    {
        let promise = Self::pending(event_loop);
        let settler = Settler {
            shared: Rc::clone(&promise.shared),
        };
        if let Err(err) = initializer(settler.clone()) {
            settler.reject(err);
        }
        promise
    }

    /// A pending promise together with its settler.
    pub fn deferred(event_loop: &EventLoop) -> (Self, Settler<T>) {
        let promise = Self::pending(event_loop);
        let settler = Settler {
            shared: Rc::clone(&promise.shared),
        };
        (promise, settler)
    }

    pub fn resolve(event_loop: &EventLoop, value: T) -> Self {
        Self::new(event_loop, |settler| settler.resolve(value))
    }

    pub fn reject(event_loop: &EventLoop, reason: impl Into<Reason>) -> Self {
        let reason = reason.into();
        Self::new(event_loop, |settler| settler.reject(reason))
    }

    /// Turn a resolution into a promise. Concrete promises pass through as-is.
    pub fn from_resolution(event_loop: &EventLoop, resolution: impl Into<Resolution<T>>) -> Self {
        let resolution = resolution.into();
        if let Resolution::Adopt(thenable) = &resolution
            && let Some(promise) = thenable.as_promise()
        {
            return promise.clone();
        }
        Self::new(event_loop, |settler| settler.settle(resolution))
    }

    /// The settled outcome, or `None` while pending.
    #[must_use]
    pub fn result(&self) -> Option<Result<T, Reason>> {
        match &*self.shared.state.borrow() {
            State::Pending { .. } => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.result().and_then(Result::ok)
    }

    #[must_use]
    pub fn reason(&self) -> Option<Reason> {
        self.result().and_then(Result::err)
    }

    /// Register raw callbacks without deriving a new promise.
    pub(crate) fn observe<F, G>(&self, on_fulfilled: F, on_rejected: G)
    where
        F: FnOnce(T) + 'static,
        G: FnOnce(Reason) + 'static,
    {
        self.register(Box::new(on_fulfilled), Box::new(on_rejected));
    }

    fn register(&self, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected) {
        self.shared.handled.set(true);
        let settled = match &mut *self.shared.state.borrow_mut() {
            State::Pending {
                on_fulfilled: fulfilled,
                on_rejected: rejected,
            } => {
                fulfilled.push_back(on_fulfilled);
                rejected.push_back(on_rejected);
                return;
            }
            State::Fulfilled(value) => Ok(value.clone()),
            State::Rejected(reason) => Err(reason.clone()),
        };
        match settled {
            Ok(value) => self.shared.event_loop.defer(move || on_fulfilled(value)),
            Err(reason) => self.shared.event_loop.defer(move || on_rejected(reason)),
        }
    }

    /// Derive a promise from this one's outcome.
    ///
    /// Exactly one of the transformers runs, on a later turn. Whatever it
    /// returns settles the derived promise: a value fulfils it, `Err` or
    /// [`Resolution::Reject`] rejects it, and a promise-like value is adopted.
    pub fn then<U, F, R, G, S>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: Into<Resolution<U>>,
        G: FnOnce(Reason) -> S + 'static,
        S: Into<Resolution<U>>,
    {
        let derived = Promise::<U>::pending(&self.shared.event_loop);
        let fulfil = Settler {
            shared: Rc::clone(&derived.shared),
        };
        let fail = fulfil.clone();
        self.register(
            Box::new(move |value| fulfil.settle(on_fulfilled(value))),
            Box::new(move |reason| fail.settle(on_rejected(reason))),
        );
        derived
    }

    /// `then` with the rejection passed through unchanged.
    pub fn and_then<U, F, R>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: Into<Resolution<U>>,
    {
        self.then(on_fulfilled, Resolution::<U>::Reject)
    }

    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Resolution::Fulfill(f(value)), Resolution::<U>::Reject)
    }

    /// `then` with the value passed through unchanged.
    pub fn catch<G, S>(&self, on_rejected: G) -> Promise<T>
    where
        G: FnOnce(Reason) -> S + 'static,
        S: Into<Resolution<T>>,
    {
        self.then(Resolution::<T>::Fulfill, on_rejected)
    }

    /// Run `on_settled` on either path, then repeat this promise's outcome.
    ///
    /// The callback's own result is waited for but its value is discarded. If
    /// it rejects, that rejection replaces the original outcome.
    pub fn finally<F, R>(&self, on_settled: F) -> Promise<T>
    where
        F: FnOnce() -> R + 'static,
        R: Into<Resolution<()>>,
    {
        let callback = Rc::new(Cell::new(Some(on_settled)));
        let event_loop = self.shared.event_loop.clone();
        let after_value = {
            let callback = Rc::clone(&callback);
            let event_loop = event_loop.clone();
            move |value: T| run_finally(&event_loop, &callback).map(move |()| value)
        };
        let after_reason = move |reason: Reason| {
            run_finally(&event_loop, &callback).and_then(move |()| Resolution::<T>::Reject(reason))
        };
        self.then(after_value, after_reason)
    }
}

fn run_finally<F, R>(event_loop: &EventLoop, callback: &Cell<Option<F>>) -> Promise<()>
where
    F: FnOnce() -> R,
    R: Into<Resolution<()>>,
{
    let resolution = match callback.take() {
        Some(callback) => callback().into(),
        None => Resolution::Fulfill(()),
    };
    Promise::from_resolution(event_loop, resolution)
}

impl<T: Clone + 'static> Thenable<T> for Promise<T> {
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(Reason)>,
    ) {
        self.register(on_fulfilled, on_rejected);
    }

    fn as_promise(&self) -> Option<&Promise<T>> {
        Some(self)
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .finish()
    }
}

//! Async driver tests

use std::time::Duration;

use pledge::prelude::*;
use pledge::{FromFn, from_fn, spawn};

use crate::common::{event_loop, fulfil_after, millis, quiet_loop};

/// Fetches `count` pages, each taking 10ms, and collects their numbers.
struct Pager {
    event_loop: EventLoop,
    count: u32,
    pages: Vec<u32>,
}

impl Coroutine for Pager {
    type Yield = u32;
    type Output = Vec<u32>;

    fn resume(&mut self, input: Resume<u32>) -> Result<Suspend<u32, Vec<u32>>, Reason> {
        match input {
            Resume::Start => {}
            Resume::Next(page) => self.pages.push(page),
            Resume::Throw(reason) => return Err(reason),
        }
        let next = self.pages.len() as u32;
        if next == self.count {
            return Ok(Suspend::Complete(self.pages.clone()));
        }
        Ok(Suspend::awaiting(fulfil_after(&self.event_loop, 10, next)))
    }
}

#[test]
fn drives_a_state_machine_to_completion() {
    let event_loop = event_loop();
    let pages = spawn(
        &event_loop,
        Pager {
            event_loop: event_loop.clone(),
            count: 4,
            pages: Vec::new(),
        },
    );
    event_loop.run_until_idle().unwrap();
    assert_eq!(pages.value(), Some(vec![0, 1, 2, 3]));
    assert_eq!(millis(&event_loop), 40);
}

#[test]
fn zero_awaits_completes_on_next_turn() {
    let event_loop = event_loop();
    let pages = spawn(
        &event_loop,
        Pager {
            event_loop: event_loop.clone(),
            count: 0,
            pages: Vec::new(),
        },
    );
    assert_eq!(pages.status(), Status::Pending);
    assert!(event_loop.turn());
    assert_eq!(pages.value(), Some(Vec::new()));
}

fn retrying(
    event_loop: &EventLoop,
    failures: u32,
) -> FromFn<
    impl FnMut(Resume<String>) -> Result<Suspend<String, String>, Reason> + use<>,
    String,
    String,
> {
    let handle = event_loop.clone();
    let mut attempts = 0;
    from_fn(move |input: Resume<String>| {
        match input {
            Resume::Next(body) => return Ok(Suspend::Complete(format!("{body} after {attempts}"))),
            Resume::Throw(reason) if attempts > 3 => return Err(reason),
            Resume::Start | Resume::Throw(_) => {}
        }
        attempts += 1;
        let attempt: Promise<String> = if attempts <= failures {
            Promise::reject(&handle, Reason::msg(format!("attempt {attempts} failed")))
        } else {
            Promise::resolve(&handle, "ok".to_string())
        };
        Ok(Suspend::awaiting(attempt))
    })
}

#[test]
fn catches_rejections_and_retries() {
    let event_loop = quiet_loop();
    let outcome = spawn(&event_loop, retrying(&event_loop, 2));
    let report = event_loop.run_until_idle().unwrap();
    assert_eq!(outcome.value().as_deref(), Some("ok after 3"));
    assert!(report.is_clean());
}

#[test]
fn gives_up_with_the_last_reason() {
    let event_loop = quiet_loop();
    let outcome = spawn(&event_loop, retrying(&event_loop, 10));
    event_loop.run_until_idle().unwrap();
    assert_eq!(outcome.reason().unwrap().to_string(), "attempt 4 failed");
}

#[test]
fn output_promise_composes_with_combinators() {
    let event_loop = event_loop();
    let first = spawn(
        &event_loop,
        Pager {
            event_loop: event_loop.clone(),
            count: 2,
            pages: Vec::new(),
        },
    );
    let timers = event_loop.clone();
    let second = Promise::new(&event_loop, move |settler| {
        timers.set_timeout(Duration::from_millis(5), move || settler.resolve(vec![9]));
    });
    let both = Promise::<Vec<u32>>::all(&event_loop, vec![first, second]);
    event_loop.run_until_idle().unwrap();
    assert_eq!(both.value(), Some(vec![vec![0, 1], vec![9]]));
}

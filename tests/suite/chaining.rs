//! Settlement and chaining behaviour through the public facade

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pledge::prelude::*;
use pledge::{ChainCycle, LoopConfig, LoopError};

use crate::common::{event_loop, fulfil_after, millis, quiet_loop, record_unhandled, reject_after};

#[test]
fn only_first_settle_counts() {
    let event_loop = event_loop();
    let promise = Promise::new(&event_loop, |settler| {
        let again = settler.clone();
        settler.resolve("first");
        again.reject(Reason::msg("second"));
        again.resolve("third");
    });
    event_loop.run_until_idle().unwrap();
    assert_eq!(promise.status(), Status::Fulfilled);
    assert_eq!(promise.value(), Some("first"));
}

#[test]
fn continuations_see_identical_value_in_order() {
    let event_loop = event_loop();
    let source = fulfil_after(&event_loop, 10, vec![1, 2, 3]);
    let order = Rc::new(RefCell::new(Vec::new()));
    for label in 0..4 {
        let order = Rc::clone(&order);
        source.map(move |values: Vec<i32>| order.borrow_mut().push((label, values)));
    }
    event_loop.run_until_idle().unwrap();

    let order = order.borrow();
    assert_eq!(order.len(), 4);
    for (index, (label, values)) in order.iter().enumerate() {
        assert_eq!(*label, index);
        assert_eq!(values, &vec![1, 2, 3]);
    }
}

#[test]
fn then_never_runs_synchronously() {
    let event_loop = event_loop();
    let ran = Rc::new(Cell::new(false));

    let pending = Promise::<u8>::deferred(&event_loop).0;
    let settled = Promise::resolve(&event_loop, 1u8);
    event_loop.run_until_idle().unwrap();

    for source in [pending, settled] {
        let flag = Rc::clone(&ran);
        let derived = source.map(move |n| {
            flag.set(true);
            n
        });
        assert_eq!(derived.status(), Status::Pending);
    }
    assert!(!ran.get());
    event_loop.run_until_idle().unwrap();
    assert!(ran.get());
}

#[test]
fn value_flows_through_a_long_chain() {
    let event_loop = event_loop();
    let handle = event_loop.clone();
    let result = Promise::resolve(&event_loop, 2)
        .map(|n| n + 1)
        .and_then(move |n| fulfil_after(&handle, 25, n * 10))
        .and_then(|n: i32| if n > 20 { Ok(n) } else { Err(Reason::msg("too small")) })
        .map(|n: i32| format!("result={n}"));
    event_loop.run_until_idle().unwrap();
    assert_eq!(result.value().as_deref(), Some("result=30"));
    assert_eq!(millis(&event_loop), 25);
}

#[test]
fn two_level_assimilation_adopts_innermost_result() {
    let event_loop = event_loop();
    let outer = event_loop.clone();
    let derived = Promise::resolve(&event_loop, ()).and_then(move |()| {
        let inner = outer.clone();
        fulfil_after(&outer, 5, ()).and_then(move |()| fulfil_after(&inner, 5, "deep"))
    });
    event_loop.run_until_idle().unwrap();
    assert_eq!(derived.value(), Some("deep"));
    assert_eq!(millis(&event_loop), 10);
}

#[test]
fn rejection_skips_fulfilment_handlers_until_caught() {
    let event_loop = event_loop();
    let skipped = Rc::new(Cell::new(0));
    let counter = Rc::clone(&skipped);
    let recovered = reject_after::<i32>(&event_loop, 3, "broken")
        .map(move |n| {
            counter.set(counter.get() + 1);
            n
        })
        .catch(|reason| Ok::<_, Reason>(reason.to_string().len() as i32));
    let report = event_loop.run_until_idle().unwrap();
    assert_eq!(recovered.value(), Some(6));
    assert_eq!(skipped.get(), 0);
    assert!(report.is_clean());
}

#[test]
fn typed_errors_survive_as_reasons() {
    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded for {0}")]
    struct QuotaExceeded(&'static str);

    let event_loop = quiet_loop();
    let failed = Promise::resolve(&event_loop, "alice")
        .and_then(|user| Err::<u32, _>(QuotaExceeded(user)));
    event_loop.run_until_idle().unwrap();

    let reason = failed.reason().unwrap();
    assert_eq!(reason.to_string(), "quota exceeded for alice");
    assert_eq!(reason.downcast_ref::<QuotaExceeded>().unwrap().0, "alice");
}

#[test]
fn anyhow_errors_become_reasons() {
    let event_loop = quiet_loop();
    let failed = Promise::<()>::reject(
        &event_loop,
        Reason::from_anyhow(anyhow::anyhow!("context lost").context("loading profile")),
    );
    event_loop.run_until_idle().unwrap();
    let reason = failed.reason().unwrap();
    assert_eq!(reason.to_string(), "loading profile");
    assert_eq!(reason.as_anyhow().root_cause().to_string(), "context lost");
}

#[test]
fn finally_keeps_outcomes() {
    let event_loop = quiet_loop();
    let cleanups = Rc::new(Cell::new(0));

    let counter = Rc::clone(&cleanups);
    let kept = fulfil_after(&event_loop, 5, 11).finally(move || counter.set(counter.get() + 1));
    let counter = Rc::clone(&cleanups);
    let failed = reject_after::<i32>(&event_loop, 5, "kept reason")
        .finally(move || counter.set(counter.get() + 1));

    event_loop.run_until_idle().unwrap();
    assert_eq!(cleanups.get(), 2);
    assert_eq!(kept.value(), Some(11));
    assert_eq!(failed.reason().unwrap().to_string(), "kept reason");
}

#[test]
fn self_adoption_is_a_chain_cycle() {
    let event_loop = quiet_loop();
    let (promise, settler) = Promise::<()>::deferred(&event_loop);
    settler.adopt(promise.clone());
    event_loop.run_until_idle().unwrap();
    assert!(promise.reason().unwrap().is::<ChainCycle>());
}

#[test]
fn unhandled_rejections_reach_the_hook() {
    let event_loop = quiet_loop();
    let seen = record_unhandled(&event_loop);
    let lost = reject_after::<()>(&event_loop, 1, "nobody listened");
    let observed = reject_after::<()>(&event_loop, 1, "somebody listened");
    let _handled = observed.catch(|_| ());

    let report = event_loop.run_until_idle().unwrap();
    assert_eq!(report.unhandled.len(), 1);
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].promise, lost.id());
    assert_eq!(seen[0].reason.to_string(), "nobody listened");
}

#[test]
fn turn_budget_stops_runaway_chains() {
    fn spin(event_loop: &EventLoop) {
        let again = event_loop.clone();
        event_loop.defer(move || spin(&again));
    }

    let event_loop = EventLoop::with_config(LoopConfig::default().with_max_turns(50));
    spin(&event_loop);

    let err = event_loop.run_until_idle().unwrap_err();
    assert_eq!(err, LoopError::TurnBudgetExhausted { limit: 50 });
}

//! Combinator tests

use pledge::prelude::*;
use pledge::{AggregateError, all, all_settled, any, race};

use crate::common::{event_loop, fulfil_after, millis, quiet_loop, reject_after};

#[test]
fn all_waits_for_every_input_and_keeps_order() {
    let event_loop = event_loop();
    let combined = Promise::<&str>::all(
        &event_loop,
        vec![
            fulfil_after(&event_loop, 30, "v1"),
            fulfil_after(&event_loop, 20, "v2"),
            fulfil_after(&event_loop, 10, "v3"),
        ],
    );

    event_loop.advance(std::time::Duration::from_millis(20)).unwrap();
    assert_eq!(combined.status(), Status::Pending);

    event_loop.run_until_idle().unwrap();
    assert_eq!(combined.value(), Some(vec!["v1", "v2", "v3"]));
    assert_eq!(millis(&event_loop), 30);
}

#[test]
fn all_rejects_without_waiting_for_slow_inputs() {
    let event_loop = quiet_loop();
    let combined = all(
        &event_loop,
        vec![
            fulfil_after(&event_loop, 1_000, 1),
            reject_after(&event_loop, 5, "fast failure"),
        ],
    );
    let observed_at = std::rc::Rc::new(std::cell::Cell::new(None));
    let clock = event_loop.clone();
    let at = std::rc::Rc::clone(&observed_at);
    let _watch = combined.then(|_| (), move |_| at.set(Some(clock.now().as_millis() as u64)));

    event_loop.run_until_idle().unwrap();
    assert_eq!(combined.reason().unwrap().to_string(), "fast failure");
    assert_eq!(observed_at.get(), Some(5));
}

#[test]
fn all_accepts_mixed_inputs() {
    let event_loop = event_loop();
    let inputs: Vec<Resolution<u32>> = vec![
        Resolution::Fulfill(1),
        fulfil_after(&event_loop, 5, 2).into(),
        Ok::<_, Reason>(3).into(),
    ];
    let combined = all(&event_loop, inputs);
    event_loop.run_until_idle().unwrap();
    assert_eq!(combined.value(), Some(vec![1, 2, 3]));
}

#[test]
fn race_follows_the_first_settlement() {
    let event_loop = quiet_loop();
    let fulfilled_first = race(
        &event_loop,
        vec![
            reject_after(&event_loop, 20, "late"),
            fulfil_after(&event_loop, 10, "early"),
        ],
    );
    let rejected_first = race(
        &event_loop,
        vec![
            fulfil_after(&event_loop, 20, "late"),
            reject_after(&event_loop, 10, "early failure"),
        ],
    );
    event_loop.run_until_idle().unwrap();
    assert_eq!(fulfilled_first.value(), Some("early"));
    assert_eq!(rejected_first.reason().unwrap().to_string(), "early failure");
}

#[test]
fn all_settled_never_rejects() {
    let event_loop = quiet_loop();
    let settled = all_settled(
        &event_loop,
        vec![
            fulfil_after(&event_loop, 3, 10),
            reject_after(&event_loop, 1, "nope"),
            fulfil_after(&event_loop, 2, 30),
        ],
    );
    let report = event_loop.run_until_idle().unwrap();

    let entries = settled.value().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].value(), Some(&10));
    assert_eq!(entries[1].reason().unwrap().to_string(), "nope");
    assert_eq!(entries[2].value(), Some(&30));
    assert!(report.is_clean());
}

#[test]
fn all_settled_entries_serialize_with_status_tag() {
    let event_loop = quiet_loop();
    let settled = Promise::<i32>::all_settled(
        &event_loop,
        vec![
            Promise::resolve(&event_loop, 1),
            Promise::reject(&event_loop, Reason::msg("bad")),
        ],
    );
    event_loop.run_until_idle().unwrap();

    let json = serde_json::to_value(settled.value().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            { "status": "fulfilled", "value": 1 },
            { "status": "rejected", "reason": "bad" }
        ])
    );
}

#[test]
fn any_takes_the_first_fulfilment() {
    let event_loop = quiet_loop();
    let winner = any(
        &event_loop,
        vec![
            reject_after(&event_loop, 1, "a"),
            fulfil_after(&event_loop, 8, "slow success"),
            fulfil_after(&event_loop, 4, "fast success"),
        ],
    );
    event_loop.run_until_idle().unwrap();
    assert_eq!(winner.value(), Some("fast success"));
}

#[test]
fn any_rejects_only_after_every_input_rejects() {
    let event_loop = quiet_loop();
    let combined = Promise::<()>::any(
        &event_loop,
        vec![
            reject_after(&event_loop, 30, "third"),
            reject_after(&event_loop, 10, "first"),
            reject_after(&event_loop, 20, "second"),
        ],
    );

    event_loop.advance(std::time::Duration::from_millis(25)).unwrap();
    assert_eq!(combined.status(), Status::Pending);

    event_loop.run_until_idle().unwrap();
    let reason = combined.reason().unwrap();
    let aggregate = reason.downcast_ref::<AggregateError>().unwrap();
    let messages: Vec<String> = aggregate.errors().iter().map(ToString::to_string).collect();
    assert_eq!(messages, vec!["third", "first", "second"]);
    assert_eq!(reason.to_string(), "all 3 promises were rejected");
}

#[test]
fn empty_inputs() {
    let event_loop = quiet_loop();
    let none: Vec<Promise<u8>> = Vec::new();
    let all_empty = Promise::<u8>::all(&event_loop, none.clone());
    let settled_empty = Promise::<u8>::all_settled(&event_loop, none.clone());
    let any_empty = Promise::<u8>::any(&event_loop, none.clone());
    let race_empty = Promise::<u8>::race(&event_loop, none);
    event_loop.run_until_idle().unwrap();

    assert_eq!(all_empty.value(), Some(Vec::new()));
    assert!(settled_empty.value().unwrap().is_empty());
    assert!(any_empty.reason().unwrap().is::<AggregateError>());
    assert_eq!(race_empty.status(), Status::Pending);
}

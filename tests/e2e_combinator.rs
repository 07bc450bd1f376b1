//! Combinator E2E suite: tasks, sleeps and events composed through
//! `any_of`, `all_of`, `most_of` and `timeout` on a virtual clock.
//!
//! Every scenario checks the value, the virtual time at which it was
//! produced, and that losers were dropped rather than left running.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use common::*;
use oxco::util::scope_guard;
use oxco::{
    all_of, all_of_range, any_of, any_of_range, most_of, sleep_for, task, timeout, ErrorKind,
    Error, Event, Task, Time,
};

fn sleeper(ms: u64, value: u32, dropped: &Rc<Cell<u32>>) -> Task<u32> {
    let dropped = Rc::clone(dropped);
    task(move |cx| async move {
        let _guard = scope_guard(move || dropped.set(dropped.get() + 1));
        cx.sleep(Duration::from_millis(ms)).await?;
        Ok(value)
    })
}

fn failer(ms: u64, message: &'static str) -> Task<u32> {
    task(move |cx| async move {
        cx.sleep(Duration::from_millis(ms)).await?;
        Err(Error::user(message))
    })
}

#[test]
fn race_picks_the_earliest_sleeper() {
    test_phase!("race_picks_the_earliest_sleeper");
    let dropped = Rc::new(Cell::new(0));
    let d = Rc::clone(&dropped);
    let (options, now) = run_test(|cx| async move {
        let race = any_of((sleeper(30, 1, &d), sleeper(10, 2, &d), sleeper(20, 3, &d)));
        let options = cx.wait(race).await?;
        Ok((options, cx.now()))
    });
    assert_eq!(options, (None, Some(2), None));
    assert_eq!(now, Time::from_millis(10));
    assert_with_log!(dropped.get() == 3, "every body dropped", 3, dropped.get());
    test_complete!("race_picks_the_earliest_sleeper");
}

#[test]
fn all_of_range_keeps_index_order() {
    let dropped = Rc::new(Cell::new(0));
    let d = Rc::clone(&dropped);
    let (values, now) = run_test(|cx| async move {
        let children = (0..5_u32).map(|i| sleeper(u64::from(5 - i), i, &d));
        let values = cx.wait(all_of_range(children.collect::<Vec<_>>())).await?;
        Ok((values, cx.now()))
    });
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
    assert_eq!(now, Time::from_millis(5));
    assert_eq!(dropped.get(), 5);
}

#[test]
fn all_of_failure_short_circuits() {
    let dropped = Rc::new(Cell::new(0));
    let d = Rc::clone(&dropped);
    let (err, now) = run_test(|cx| async move {
        let group = all_of((sleeper(100, 1, &d), failer(3, "disk"), sleeper(200, 2, &d)));
        let err = cx.wait(group).await.unwrap_err();
        Ok((err, cx.now()))
    });
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.message(), Some("disk"));
    assert_eq!(now, Time::from_millis(3));
    assert_eq!(dropped.get(), 2);
}

#[test]
fn first_error_in_time_wins() {
    let err = run_test(|cx| async move {
        let group = all_of((failer(9, "late"), failer(4, "early")));
        Ok(cx.wait(group).await.unwrap_err())
    });
    assert_eq!(err.message(), Some("early"));
}

#[test]
fn most_of_waits_for_everyone() {
    let dropped = Rc::new(Cell::new(0));
    let d = Rc::clone(&dropped);
    let (options, now) = run_test(|cx| async move {
        let options = cx
            .wait(most_of((sleeper(5, 1, &d), sleeper(10, 2, &d))))
            .await?;
        Ok((options, cx.now()))
    });
    assert_eq!(options, (Some(1), Some(2)));
    assert_eq!(now, Time::from_millis(10));
}

#[test]
fn cancelled_most_of_keeps_finished_values() {
    let dropped = Rc::new(Cell::new(0));
    let d = Rc::clone(&dropped);
    let (outer, now) = run_test(|cx| async move {
        let inner = most_of((sleeper(5, 1, &d), sleeper(50, 2, &d)));
        let outer = cx.wait(any_of((inner, sleep_for(Duration::from_millis(7))))).await?;
        Ok((outer, cx.now()))
    });
    assert_eq!(outer, (Some((Some(1), None)), Some(())));
    assert_eq!(now, Time::from_millis(7));
    assert_eq!(dropped.get(), 2);
}

#[test]
fn timeout_around_all_of_expires() {
    let (err, now) = run_test(|cx| async move {
        let dropped = Rc::new(Cell::new(0));
        let work = all_of((sleeper(5, 1, &dropped), sleeper(20, 2, &dropped)));
        let err = cx
            .wait(timeout(Duration::from_millis(10), work))
            .await
            .unwrap_err();
        Ok((err.kind(), cx.now()))
    });
    assert_eq!(err, ErrorKind::DeadlineExceeded);
    assert_eq!(now, Time::from_millis(10));
}

#[test]
fn timeout_passes_value_through() {
    let dropped = Rc::new(Cell::new(0));
    let d = Rc::clone(&dropped);
    let v = run_test(|cx| async move {
        cx.wait(timeout(Duration::from_millis(10), sleeper(3, 9, &d)))
            .await
    });
    assert_eq!(v, 9);
}

#[test]
fn event_beats_a_long_sleep() {
    let (result, now) = run_test(|cx| async move {
        let event = Event::new();
        let trigger = {
            let event = event.clone();
            task(move |cx| async move {
                cx.sleep(Duration::from_millis(5)).await?;
                event.trigger();
                Ok(())
            })
        };
        let waiter = any_of((event.wait(), sleep_for(Duration::from_secs(60))));
        let result = cx.wait(all_of((trigger, waiter))).await?;
        Ok((result, cx.now()))
    });
    assert_eq!(result, ((), (Some(()), None)));
    assert_eq!(now, Time::from_millis(5));
}

#[test]
fn any_of_range_over_gates_cancels_the_rest() {
    init_test_logging();
    let (gates, keys): (Vec<_>, Vec<_>) = (0..4).map(|_| gate(true)).unzip();
    let mut m = Manual::new(any_of_range(gates));
    m.start().unwrap();
    assert!(keys.iter().all(GateKey::is_waiting));

    keys[2].open(Ok(7));
    assert_eq!(m.resumes(), 1);
    for (i, key) in keys.iter().enumerate() {
        assert!(!key.is_waiting(), "gate {i} still waiting");
        assert_eq!(key.cancels(), u32::from(i != 2));
    }
    assert_eq!(m.finish().unwrap(), vec![None, None, Some(7), None]);
}

#[test]
fn runs_are_deterministic() {
    fn scenario() -> Vec<(u64, u32)> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&log);
        run_test(move |cx| async move {
            let children: Vec<_> = [7_u64, 3, 3, 11, 1]
                .into_iter()
                .enumerate()
                .map(|(i, ms)| {
                    let seen = Rc::clone(&seen);
                    task(move |cx| async move {
                        cx.sleep(Duration::from_millis(ms)).await?;
                        cx.yield_now().await?;
                        seen.borrow_mut().push((cx.now().as_millis(), i as u32));
                        Ok(())
                    })
                })
                .collect();
            cx.wait(all_of_range(children)).await?;
            Ok(())
        });
        let out = log.borrow().clone();
        out
    }

    let first = scenario();
    assert_eq!(first, scenario());
    assert_eq!(first, vec![(1, 4), (3, 1), (3, 2), (7, 0), (11, 3)]);
}

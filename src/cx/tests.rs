use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::*;
use crate::awaiter::suspend_forever;
use crate::error::{Error, ErrorKind};
use crate::sync::Event;
use crate::test_utils::run_test;
use crate::time::timeout;
use crate::types::Time;
use crate::util::scope_guard;

#[test]
fn nested_task_value_flows_back() {
    let v = run_test(|cx| async move {
        let inner = task(|cx| async move {
            cx.yield_now().await?;
            Ok(4)
        });
        Ok(cx.wait(inner).await? + 1)
    });
    assert_eq!(v, 5);
}

#[test]
fn tasks_get_distinct_ids() {
    let (outer, inner) = run_test(|cx| async move {
        let inner = cx.wait(task(|cx| async move { Ok(cx.task_id()) })).await?;
        Ok((cx.task_id(), inner))
    });
    assert!(outer.is_some());
    assert!(inner.is_some());
    assert_ne!(outer, inner);
}

#[test]
fn sleep_advances_virtual_clock() {
    let now = run_test(|cx| async move {
        cx.sleep(Duration::from_millis(30)).await?;
        cx.sleep_until(Time::from_millis(45)).await?;
        Ok(cx.now())
    });
    assert_eq!(now, Time::from_millis(45));
}

#[test]
fn timeout_inside_task_reports_deadline() {
    let (kind, now) = run_test(|cx| async move {
        let err = cx
            .wait(timeout(Duration::from_millis(5), suspend_forever()))
            .await
            .unwrap_err();
        Ok((err.kind(), cx.now()))
    });
    assert_eq!(kind, ErrorKind::DeadlineExceeded);
    assert_eq!(now, Time::from_millis(5));
}

#[test]
fn nursery_join_waits_for_every_child() {
    let (log, now) = run_test(|cx| async move {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&log);
        let scope = Nursery::open(move |n, cx| async move {
            for (label, ms) in [("slow", 20), ("fast", 10)] {
                let log = Rc::clone(&seen);
                n.start(move |cx| async move {
                    cx.sleep(Duration::from_millis(ms)).await?;
                    log.borrow_mut().push(label);
                    Ok(())
                })?;
            }
            assert_eq!(n.live(), 2);
            cx.wait(n.join()).await?;
            assert_eq!(n.live(), 0);
            Ok(())
        });
        cx.wait(scope).await?;
        let log = log.borrow().clone();
        Ok((log, cx.now()))
    });
    assert_eq!(log, vec!["fast", "slow"]);
    assert_eq!(now, Time::from_millis(20));
}

#[test]
fn join_then_return_resumes_scope_once() {
    let after = Rc::new(Cell::new(0_u32));
    let count = Rc::clone(&after);
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    let v = run_test(|cx| async move {
        let scope = Nursery::open(move |n, cx| async move {
            n.start(move |cx| async move {
                cx.yield_now().await?;
                flag.set(true);
                Ok(())
            })?;
            cx.wait(n.join()).await?;
            Ok(7)
        });
        let v = cx.wait(scope).await?;
        count.set(count.get() + 1);
        Ok(v)
    });
    assert_eq!(v, 7);
    assert!(ran.get());
    assert_eq!(after.get(), 1);
}

#[test]
fn join_without_children_is_immediate() {
    let v = run_test(|cx| async move {
        let scope = Nursery::open(|n, cx| async move {
            cx.wait(n.join()).await?;
            Ok(cx.now())
        });
        cx.wait(scope).await
    });
    assert_eq!(v, Time::ZERO);
}

#[test]
fn body_finishing_cancels_children() {
    let dropped = Rc::new(Cell::new(false));
    let flag = Rc::clone(&dropped);
    let v = run_test(|cx| async move {
        let scope = Nursery::open(move |n, _cx| async move {
            n.start(move |cx| async move {
                let _guard = scope_guard(move || flag.set(true));
                let never = cx.wait(suspend_forever()).await?;
                match never {}
            })?;
            Ok(5)
        });
        cx.wait(scope).await
    });
    assert_eq!(v, 5);
    assert!(dropped.get());
}

#[test]
fn child_failure_cancels_body() {
    let (err, now) = run_test(|cx| async move {
        let scope = Nursery::open(|n, cx| async move {
            n.start(|cx| async move {
                cx.sleep(Duration::from_millis(5)).await?;
                Err(Error::user("boom"))
            })?;
            cx.sleep(Duration::from_secs(1)).await?;
            Ok(())
        });
        let err = cx.wait(scope).await.unwrap_err();
        Ok((err, cx.now()))
    });
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.message(), Some("boom"));
    assert!(err.task().is_some());
    assert_eq!(now, Time::from_millis(5));
}

#[test]
fn body_error_is_the_scope_error() {
    let err = run_test(|cx| async move {
        let scope = Nursery::open(|n, _cx| async move {
            n.start(|cx| async move {
                let never = cx.wait(suspend_forever()).await?;
                match never {}
            })?;
            Err::<(), _>(Error::user("body"))
        });
        Ok(cx.wait(scope).await.unwrap_err())
    });
    assert_eq!(err.message(), Some("body"));
}

#[test]
fn start_while_cancelling_skips_the_child() {
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    let err = run_test(|cx| async move {
        let scope = Nursery::open(move |n, cx| async move {
            n.start(|_cx| async move { Err(Error::user("early")) })?;
            n.start(move |_cx| async move {
                flag.set(true);
                Ok(())
            })?;
            cx.wait(n.join()).await?;
            Ok(())
        });
        Ok(cx.wait(scope).await.unwrap_err())
    });
    assert_eq!(err.message(), Some("early"));
    assert!(!ran.get());
}

#[test]
fn start_after_close_fails() {
    let err = run_test(|cx| async move {
        let saved = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&saved);
        let scope = Nursery::open(move |n, _cx| async move {
            *keep.borrow_mut() = Some(n);
            Ok(())
        });
        cx.wait(scope).await?;
        let n = saved.borrow_mut().take();
        let n = n.ok_or_else(|| Error::internal("nursery handle not saved"))?;
        assert_eq!(n.live(), 0);
        Ok(n.start(|_cx| async move { Ok(()) }).unwrap_err())
    });
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[test]
fn event_wakes_waiting_child() {
    let woke_at = run_test(|cx| async move {
        let event = Event::new();
        let at = Rc::new(Cell::new(None));
        let seen = Rc::clone(&at);
        let ev = event.clone();
        let scope = Nursery::open(move |n, cx| async move {
            n.start(move |cx| async move {
                cx.wait(ev.wait()).await?;
                seen.set(Some(cx.now()));
                Ok(())
            })?;
            cx.sleep(Duration::from_millis(7)).await?;
            assert_eq!(event.waiters(), 1);
            event.trigger();
            cx.wait(n.join()).await?;
            Ok(())
        });
        cx.wait(scope).await?;
        Ok(at.get())
    });
    assert_eq!(woke_at, Some(Time::from_millis(7)));
}

#[test]
fn cancel_is_visible_to_body() {
    let seen = Rc::new(Cell::new(false));
    let flag = Rc::clone(&seen);
    let v = run_test(|cx| async move {
        let scope = Nursery::open(move |n, _cx| async move {
            n.start(move |cx| async move {
                let watcher = cx.clone();
                let _guard = scope_guard(move || flag.set(watcher.is_cancel_requested()));
                let never = cx.wait(suspend_forever()).await?;
                match never {}
            })?;
            Ok("done")
        });
        cx.wait(scope).await
    });
    assert_eq!(v, "done");
    assert!(seen.get());
}

//! Integration Tests for the Reactive Core
//!
//! These tests drive containers, subscribers, the scheduler and scopes
//! together through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::config;
use ripple_core::reactive::{Expr, Subscriber, SubscriberOptions};
use ripple_core::scheduler::{scheduler_state, SchedulerState};
use ripple_core::{
    delete_field, drain_ticks, observe, set_field, set_tick_host, tick, watch, Computed, Effect,
    Hook, ReactiveError, ReactiveMap, Scope, TokioTickHost, Value, WatchOptions,
};
use serde_json::json;

fn reactive(json: serde_json::Value) -> ReactiveMap {
    let value = Value::from_json(&json);
    observe(&value, false);
    value.as_map().cloned().unwrap()
}

fn capture_warnings() -> Rc<RefCell<Vec<ReactiveError>>> {
    let warnings = Rc::new(RefCell::new(Vec::new()));
    let w = warnings.clone();
    config::configure(|c| {
        c.warn_handler = Some(Rc::new(move |err: &ReactiveError| w.borrow_mut().push(err.clone())))
    });
    warnings
}

fn number(map: &ReactiveMap, key: &str) -> f64 {
    map.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

/// A queued subscriber over `f`, counting its evaluations.
fn counted(f: impl Fn() -> Value + 'static) -> (Rc<Subscriber>, Rc<Cell<usize>>) {
    let runs = Rc::new(Cell::new(0));
    let r = runs.clone();
    let subscriber = Subscriber::new(
        None,
        Expr::func(move || {
            r.set(r.get() + 1);
            Ok(f())
        }),
        None,
        SubscriberOptions::default(),
    )
    .unwrap();
    (subscriber, runs)
}

#[test]
fn stale_dependencies_are_released() {
    let data = reactive(json!({"flag": true, "a": 1, "b": 2}));
    let d = data.clone();
    let (subscriber, runs) = counted(move || {
        let flag = d.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
        if flag { d.get("a") } else { d.get("b") }.unwrap_or_default()
    });

    data.insert("flag", false);
    drain_ticks();
    assert_eq!(runs.get(), 2);
    assert_eq!(subscriber.value(), Value::from(2));

    data.insert("a", 10);
    drain_ticks();
    assert_eq!(runs.get(), 2);
    assert_eq!(data.dep("a").unwrap().subscriber_count(), 0);

    data.insert("b", 20);
    drain_ticks();
    assert_eq!(runs.get(), 3);
}

#[test]
fn many_mutations_run_a_subscriber_once_per_flush() {
    let data = reactive(json!({"a": 0, "b": 0, "c": 0}));
    let d = data.clone();
    let (_subscriber, runs) =
        counted(move || Value::from(number(&d, "a") + number(&d, "b") + number(&d, "c")));

    for i in 1..=5 {
        data.insert("a", i);
        data.insert("b", i);
        data.insert("c", i);
    }
    drain_ticks();

    assert_eq!(runs.get(), 2);
}

#[test]
fn subscribers_run_in_creation_order() {
    let data = reactive(json!({"x": 0, "y": 0, "z": 0}));
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut subscribers = Vec::new();

    for (name, key) in [("s1", "x"), ("s2", "y"), ("s3", "z")] {
        let (d, o) = (data.clone(), order.clone());
        let subscriber = Subscriber::new(
            None,
            Expr::func(move || Ok(d.get(key).unwrap_or_default())),
            Some(Rc::new(move |_: &Value, _: &Value| {
                o.borrow_mut().push(name);
                Ok(())
            })),
            SubscriberOptions::default(),
        )
        .unwrap();
        subscribers.push(subscriber);
    }

    data.insert("z", 1);
    data.insert("y", 1);
    data.insert("x", 1);
    drain_ticks();

    assert_eq!(*order.borrow(), vec!["s1", "s2", "s3"]);
}

#[test]
fn subscriber_queued_mid_flush_runs_in_the_same_flush() {
    let data = reactive(json!({"x": 0, "y": 0}));
    let order = Rc::new(RefCell::new(Vec::new()));

    let (d, o) = (data.clone(), order.clone());
    let _low = Subscriber::new(
        None,
        Expr::func(move || Ok(d.get("y").unwrap_or_default())),
        Some(Rc::new(move |_: &Value, _: &Value| {
            o.borrow_mut().push("low");
            Ok(())
        })),
        SubscriberOptions::default(),
    )
    .unwrap();

    let (d, writer, o) = (data.clone(), data.clone(), order.clone());
    let _high = Subscriber::new(
        None,
        Expr::func(move || Ok(d.get("x").unwrap_or_default())),
        Some(Rc::new(move |new: &Value, _: &Value| {
            o.borrow_mut().push("high");
            writer.insert("y", new.clone());
            Ok(())
        })),
        SubscriberOptions::default(),
    )
    .unwrap();

    data.insert("x", 1);
    drain_ticks();

    assert_eq!(*order.borrow(), vec!["high", "low"]);
    assert_eq!(scheduler_state(), SchedulerState::Idle);
}

#[test]
fn runaway_subscriber_is_stopped_after_100_reentries() {
    let warnings = capture_warnings();
    let data = reactive(json!({"n": 0, "other": 0}));

    let runs = Rc::new(Cell::new(0));
    let (d, writer, r) = (data.clone(), data.clone(), runs.clone());
    let looping = Subscriber::new(
        None,
        Expr::func(move || Ok(d.get("n").unwrap_or_default())),
        Some(Rc::new(move |new: &Value, _: &Value| {
            r.set(r.get() + 1);
            writer.insert("n", new.as_f64().unwrap_or(0.0) + 1.0);
            Ok(())
        })),
        SubscriberOptions::default(),
    )
    .unwrap();

    let d = data.clone();
    let (_unrelated, unrelated_runs) = counted(move || d.get("other").unwrap_or_default());

    data.insert("n", 1);
    data.insert("other", 1);
    drain_ticks();

    assert_eq!(runs.get(), 101);
    assert_eq!(unrelated_runs.get(), 2);
    assert_eq!(*warnings.borrow(), vec![ReactiveError::InfiniteLoop(looping.describe())]);

    // The next flush starts with fresh counters.
    data.insert("other", 2);
    drain_ticks();
    assert_eq!(unrelated_runs.get(), 3);
    config::reset();
}

#[test]
fn pushing_a_map_onto_a_tracked_list() {
    let data = reactive(json!({"items": []}));
    let d = data.clone();
    let (_subscriber, runs) = counted(move || d.get("items").unwrap_or_default());

    let item: ReactiveMap = [("x", 1)].into_iter().collect();
    let items = data.get_untracked("items").unwrap();
    let list = items.as_list().unwrap();
    list.push(item.clone());

    assert!(item.observer().is_some());
    assert!(item.is_reactive("x"));

    drain_ticks();
    assert_eq!(runs.get(), 2);

    // The element's own container node is reached through the list field.
    set_field(&Value::from(item), "y", 2);
    drain_ticks();
    assert_eq!(runs.get(), 3);
}

#[test]
fn nested_field_scenario() {
    let data = reactive(json!({"a": {"b": 1}}));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (d, s) = (data.clone(), seen.clone());
    let _doubled = Subscriber::new(
        None,
        Expr::func(move || {
            let a = d.get("a").unwrap_or_default();
            let b = a.get_key("b").as_f64().unwrap_or(0.0);
            Ok(Value::from(b * 2.0))
        }),
        Some(Rc::new(move |new: &Value, _: &Value| {
            s.borrow_mut().push(new.clone());
            Ok(())
        })),
        SubscriberOptions::default(),
    )
    .unwrap();

    let a = data.get_untracked("a").unwrap();
    a.as_map().unwrap().insert("b", 5);
    drain_ticks();
    assert_eq!(*seen.borrow(), vec![Value::from(10)]);

    data.insert("a", Value::from_json(&json!({"b": 7})));
    drain_ticks();
    assert_eq!(*seen.borrow(), vec![Value::from(10), Value::from(14)]);

    let a = data.get_untracked("a").unwrap();
    a.as_map().unwrap().insert("c", 9);
    drain_ticks();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn computed_is_marked_dirty_and_evaluated_on_read() {
    let data = reactive(json!({"count": 1}));
    let evaluations = Rc::new(Cell::new(0));
    let (d, e) = (data.clone(), evaluations.clone());
    let doubled = Computed::new(move || {
        e.set(e.get() + 1);
        Ok(Value::from(number(&d, "count") * 2.0))
    });

    assert!(doubled.is_dirty());
    assert_eq!(doubled.get().unwrap(), Value::from(2));
    assert!(!doubled.is_dirty());

    data.insert("count", 2);
    data.insert("count", 3);
    assert!(doubled.is_dirty());
    assert_eq!(evaluations.get(), 1);

    drain_ticks();
    assert_eq!(evaluations.get(), 1);

    assert_eq!(doubled.get().unwrap(), Value::from(6));
    assert_eq!(doubled.get().unwrap(), Value::from(6));
    assert_eq!(evaluations.get(), 2);
}

#[test]
fn reader_of_computed_reruns_when_inputs_change() {
    let data = reactive(json!({"count": 1}));
    let d = data.clone();
    let doubled = Computed::new(move || Ok(Value::from(number(&d, "count") * 2.0)));

    let c = doubled.clone();
    let (subscriber, runs) = counted(move || c.get().unwrap_or_default());
    assert_eq!(subscriber.value(), Value::from(2));

    data.insert("count", 4);
    drain_ticks();
    assert_eq!(runs.get(), 2);
    assert_eq!(subscriber.value(), Value::from(8));
}

#[test]
fn synchronous_mode_flushes_immediately() {
    config::configure(|c| c.async_flush = false);
    let data = reactive(json!({"a": 1}));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _handle = watch(
        None,
        Expr::path_on(data.clone(), "a"),
        move |new, old| {
            s.borrow_mut().push((new.clone(), old.clone()));
            Ok(())
        },
        WatchOptions::default(),
    )
    .unwrap();

    data.insert("a", 2);
    data.insert("a", 3);

    assert_eq!(
        *seen.borrow(),
        vec![(Value::from(2), Value::from(1)), (Value::from(3), Value::from(2))]
    );
    assert_eq!(scheduler_state(), SchedulerState::Idle);
    config::reset();
}

#[test]
fn synchronous_mode_runs_subscribers_in_creation_order() {
    config::configure(|c| c.async_flush = false);
    let data = reactive(json!({"flag": false, "x": 1}));
    let log = Rc::new(RefCell::new(Vec::new()));

    let (d, l) = (data.clone(), log.clone());
    let first = Subscriber::new(
        None,
        Expr::func(move || {
            l.borrow_mut().push("first");
            let flag = d.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
            Ok(if flag { d.get("x").unwrap_or_default() } else { Value::Null })
        }),
        None,
        SubscriberOptions::default(),
    )
    .unwrap();

    let (d, l) = (data.clone(), log.clone());
    let second = Subscriber::new(
        None,
        Expr::func(move || {
            l.borrow_mut().push("second");
            Ok(d.get("x").unwrap_or_default())
        }),
        None,
        SubscriberOptions::default(),
    )
    .unwrap();

    // `first` starts reading `x` only now, after `second` subscribed to it.
    data.insert("flag", true);
    let x = data.dep("x").unwrap();
    assert_eq!(x.subscribers(), vec![second.id(), first.id()]);

    log.borrow_mut().clear();
    data.insert("x", 2);
    assert_eq!(*log.borrow(), vec!["first", "second"]);
    config::reset();
}

#[test]
fn synchronous_mode_stops_runaway_subscribers() {
    config::configure(|c| c.async_flush = false);
    let warnings = capture_warnings();
    let data = reactive(json!({"n": 0}));

    let runs = Rc::new(Cell::new(0));
    let (d, writer, r) = (data.clone(), data.clone(), runs.clone());
    let looping = Subscriber::new(
        None,
        Expr::func(move || Ok(d.get("n").unwrap_or_default())),
        Some(Rc::new(move |new: &Value, _: &Value| {
            r.set(r.get() + 1);
            writer.insert("n", new.as_f64().unwrap_or(0.0) + 1.0);
            Ok(())
        })),
        SubscriberOptions::default(),
    )
    .unwrap();

    data.insert("n", 1);

    assert_eq!(runs.get(), 101);
    assert_eq!(*warnings.borrow(), vec![ReactiveError::InfiniteLoop(looping.describe())]);
    assert_eq!(scheduler_state(), SchedulerState::Idle);
    config::reset();
}

#[test]
fn dropped_subscribers_leave_no_trace_in_deps() {
    let data = reactive(json!({"a": 1}));

    for _ in 0..100 {
        let d = data.clone();
        let effect = Effect::new(move || {
            d.get("a");
        });
        drop(effect);
    }

    for _ in 0..100 {
        let scope = Scope::new("transient");
        scope
            .watch(Expr::path_on(data.clone(), "a"), |_, _| Ok(()), WatchOptions::default())
            .unwrap();
        drop(scope);
    }

    assert_eq!(data.dep("a").unwrap().subscriber_count(), 0);
}

#[test]
fn deep_watch_sees_nested_changes() {
    let scope = Scope::new("app");
    scope.init_data(Value::from_json(&json!({"a": {"b": {"c": 1}}, "list": [{"x": 1}]})));
    let fired = Rc::new(Cell::new(0));

    let f = fired.clone();
    let _deep = scope
        .watch(
            "a",
            move |_, _| {
                f.set(f.get() + 1);
                Ok(())
            },
            WatchOptions { deep: true, ..WatchOptions::default() },
        )
        .unwrap();

    let f = fired.clone();
    let _shallow_list = scope
        .watch(
            "list",
            move |_, _| {
                f.set(f.get() + 100);
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    let a = scope.resolve("a").unwrap();
    let c_holder = a.get_key("b");
    c_holder.as_map().unwrap().insert("c", 2);
    drain_ticks();
    assert_eq!(fired.get(), 1);

    let element = scope.resolve("list").unwrap().get_key("0");
    element.as_map().unwrap().insert("x", 2);
    drain_ticks();
    assert_eq!(fired.get(), 1);
}

#[test]
fn immediate_watch_and_delete_field() {
    let scope = Scope::new("app");
    let data = scope.init_data(Value::from_json(&json!({"user": {"name": "ada", "age": 36}})));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _handle = scope
        .watch(
            "user",
            move |new, _| {
                s.borrow_mut().push(new.to_json());
                Ok(())
            },
            WatchOptions { immediate: true, ..WatchOptions::default() },
        )
        .unwrap();

    let user = data.get_untracked("user").unwrap();
    delete_field(&user, "age");
    drain_ticks();

    assert_eq!(
        *seen.borrow(),
        vec![json!({"name": "ada", "age": 36}), json!({"name": "ada"})]
    );
}

#[test]
fn frozen_containers_are_left_alone() {
    let warnings = capture_warnings();
    let frozen: ReactiveMap = [("k", 1)].into_iter().collect();
    frozen.freeze();
    let data = reactive(json!({}));
    data.insert("config", frozen.clone());
    set_field(&Value::from(data.clone()), "frozen", frozen.clone());

    assert!(frozen.observer().is_none());
    assert!(!frozen.is_reactive("k"));

    frozen.insert("k", 2);
    assert_eq!(frozen.get("k"), Some(Value::from(1)));
    assert_eq!(*warnings.borrow(), vec![ReactiveError::Frozen]);
    config::reset();
}

#[test]
fn root_state_rejects_new_keys() {
    let warnings = capture_warnings();
    let scope = Scope::new("app");
    let data = scope.init_data(Value::from_json(&json!({"a": 1})));

    let returned = set_field(&Value::from(data.clone()), "b", 2);
    delete_field(&Value::from(data.clone()), "a");

    assert_eq!(returned, Value::from(2));
    assert!(!data.contains_key("b"));
    assert!(data.contains_key("a"));
    assert_eq!(
        *warnings.borrow(),
        vec![ReactiveError::RootMutation, ReactiveError::RootMutation]
    );
    config::reset();
}

#[test]
fn props_warn_and_rerender_the_child() {
    let warnings = capture_warnings();
    let child = Scope::new("child");
    let props = child.init_props([("label", "a")]);
    let renders = Rc::new(Cell::new(0));

    let (p, r) = (props.clone(), renders.clone());
    child
        .mount(move || {
            r.set(r.get() + 1);
            p.get("label");
            Ok(())
        })
        .unwrap();

    child.update_props([("label", "b")]);
    drain_ticks();
    assert_eq!(renders.get(), 2);
    assert!(warnings.borrow().is_empty());

    props.insert("label", "c");
    drain_ticks();
    assert_eq!(renders.get(), 3);
    assert_eq!(*warnings.borrow(), vec![ReactiveError::PropMutation("label".into())]);
    config::reset();
}

#[test]
fn updated_hooks_skip_scopes_destroyed_during_the_flush() {
    let shared = reactive(json!({"n": 0}));
    let parent = Scope::new("parent");
    let child = Scope::new("child");
    let log = Rc::new(RefCell::new(Vec::new()));

    for scope in [&parent, &child] {
        let (l, name) = (log.clone(), scope.name().to_string());
        scope.on(Hook::Updated, move || {
            l.borrow_mut().push(format!("{name} updated"));
            Ok(())
        });
        let s = shared.clone();
        scope
            .mount(move || {
                s.get("n");
                Ok(())
            })
            .unwrap();
    }

    let c = child.clone();
    let _destroyer = parent
        .watch(
            Expr::path_on(shared.clone(), "n"),
            move |new, _| {
                if new.as_f64() == Some(2.0) {
                    c.destroy();
                }
                Ok(())
            },
            WatchOptions::default(),
        )
        .unwrap();

    shared.insert("n", 1);
    drain_ticks();
    assert_eq!(*log.borrow(), vec!["child updated", "parent updated"]);

    log.borrow_mut().clear();
    shared.insert("n", 2);
    drain_ticks();
    assert_eq!(*log.borrow(), vec!["parent updated"]);
    assert!(child.is_destroyed());
}

#[test]
fn errors_inside_a_flush_are_reported() {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let r = reports.clone();
    config::configure(|c| {
        c.error_handler = Some(Rc::new(move |err: &ReactiveError, info: &str| {
            r.borrow_mut().push(format!("{info}: {err}"));
        }))
    });

    let scope = Scope::new("app");
    let data = scope.init_data(Value::from_json(&json!({"fail": false})));
    let d = data.clone();
    scope
        .mount(move || match d.get("fail").and_then(|v| v.as_bool()) {
            Some(true) => Err(ReactiveError::eval("render failed")),
            _ => Ok(()),
        })
        .unwrap();
    let _watch = scope
        .watch("fail", |_, _| Err(ReactiveError::eval("callback failed")), WatchOptions::default())
        .unwrap();

    data.insert("fail", true);
    drain_ticks();

    let reports = reports.borrow();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().any(|r| r.ends_with("render failed")));
    assert!(reports.contains(&"callback for watcher \"fail\": callback failed".to_string()));
    config::reset();
}

#[tokio::test]
async fn tick_resolves_after_the_flush_under_tokio() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            set_tick_host(TokioTickHost);
            let data = reactive(json!({"a": 1}));
            let seen = Rc::new(RefCell::new(Vec::new()));
            let s = seen.clone();
            let _handle = watch(
                None,
                Expr::path_on(data.clone(), "a"),
                move |new, _| {
                    s.borrow_mut().push(new.clone());
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();

            data.insert("a", 2);
            assert!(seen.borrow().is_empty());

            tick().await;
            assert_eq!(*seen.borrow(), vec![Value::from(2)]);
        })
        .await;
}

use fluxion_reactive::*;
use std::{cell::RefCell, rc::Rc};

#[test]
fn watch_runs() {
    let (a, set_a) = create_signal(-1);
    let b = Rc::new(RefCell::new(String::new()));

    let handle = watch(
        move || a.get(),
        {
            let b = b.clone();
            move |a, prev_a, prev_ret: Option<i32>| {
                *b.borrow_mut() = format!(
                    "Value is {a}; Prev is {prev_a:?}; Prev return is \
                     {prev_ret:?}"
                );
                a + 10
            }
        },
        false,
    );
    assert_eq!(b.borrow().as_str(), "");

    set_a.set(1);
    assert_eq!(
        b.borrow().as_str(),
        "Value is 1; Prev is Some(-1); Prev return is None"
    );

    set_a.set(2);
    assert_eq!(
        b.borrow().as_str(),
        "Value is 2; Prev is Some(1); Prev return is Some(11)"
    );

    handle.stop();
    *b.borrow_mut() = "nothing happened".to_string();
    set_a.set(3);
    assert_eq!(b.borrow().as_str(), "nothing happened");
}

#[test]
fn watch_runs_immediately() {
    let (a, set_a) = create_signal(-1);
    let b = Rc::new(RefCell::new(String::new()));

    watch(
        move || a.get(),
        {
            let b = b.clone();
            move |a, prev_a, prev_ret: Option<i32>| {
                *b.borrow_mut() = format!(
                    "Value is {a}; Prev is {prev_a:?}; Prev return is \
                     {prev_ret:?}"
                );
                a + 10
            }
        },
        true,
    );
    assert_eq!(
        b.borrow().as_str(),
        "Value is -1; Prev is None; Prev return is None"
    );

    set_a.set(1);
    assert_eq!(
        b.borrow().as_str(),
        "Value is 1; Prev is Some(-1); Prev return is Some(9)"
    );
}

#[test]
fn watch_callback_is_untracked() {
    let (a, set_a) = create_signal(-1);
    let (b, set_b) = create_signal(0);
    let s = Rc::new(RefCell::new(String::new()));

    watch(
        move || a.get(),
        {
            let s = s.clone();
            move |a, _, _: Option<()>| {
                *s.borrow_mut() =
                    format!("Value a is {a}; Value b is {}", b.get());
            }
        },
        false,
    );

    set_a.set(1);
    assert_eq!(s.borrow().as_str(), "Value a is 1; Value b is 0");

    *s.borrow_mut() = "nothing happened".to_string();
    set_b.set(10);
    assert_eq!(s.borrow().as_str(), "nothing happened");

    set_a.set(2);
    assert_eq!(s.borrow().as_str(), "Value a is 2; Value b is 10");
}

#[test]
fn watch_skips_equal_getter_values() {
    let (a, set_a) = create_signal(1);
    let hits = Rc::new(RefCell::new(0));

    watch(
        move || a.get() % 2,
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        false,
    );

    // 1 -> 3: parity unchanged, callback skipped
    set_a.set(3);
    assert_eq!(*hits.borrow(), 0);

    set_a.set(4);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn watch_multi_source_tuple() {
    let (a, set_a) = create_signal(1);
    let (b, set_b) = create_signal(10);
    let seen = Rc::new(RefCell::new(Vec::new()));

    watch(
        move || (a.get(), b.get()),
        {
            let seen = seen.clone();
            move |cur, prev, _: Option<()>| {
                seen.borrow_mut().push((*cur, prev.copied()));
            }
        },
        false,
    );

    set_a.set(2);
    set_b.set(20);
    assert_eq!(
        *seen.borrow(),
        vec![((2, 10), Some((1, 10))), ((2, 20), Some((2, 10)))]
    );
}

#[test]
fn watch_once_fires_exactly_once() {
    let (a, set_a) = create_signal(0);
    let hits = Rc::new(RefCell::new(0));

    watch_with_options(
        move || a.get(),
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        WatchOptions::default().once(),
    );

    set_a.set(1);
    assert_eq!(*hits.borrow(), 1);

    set_a.set(2);
    set_a.set(3);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn watch_once_immediate_fires_at_registration_only() {
    let (a, set_a) = create_signal(0);
    let hits = Rc::new(RefCell::new(0));

    watch_with_options(
        move || a.get(),
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        WatchOptions::default().immediate().once(),
    );
    assert_eq!(*hits.borrow(), 1);

    set_a.set(1);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn watch_custom_scheduler_defers_delivery() {
    let (a, set_a) = create_signal(0);
    let hits = Rc::new(RefCell::new(0));
    let jobs: Rc<RefCell<Vec<Box<dyn FnOnce()>>>> =
        Rc::new(RefCell::new(Vec::new()));

    watch_with_options(
        move || a.get(),
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        WatchOptions::default().scheduler({
            let jobs = jobs.clone();
            move |job, _is_first| jobs.borrow_mut().push(job)
        }),
    );

    set_a.set(1);
    set_a.set(2);
    // nothing delivered until the host drains its queue
    assert_eq!(*hits.borrow(), 0);
    assert_eq!(jobs.borrow().len(), 2);

    for job in jobs.borrow_mut().drain(..) {
        job();
    }
    // both jobs drain, but only the first finds the watcher dirty
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn watch_cleanup_runs_before_next_delivery_and_at_stop() {
    let (a, set_a) = create_signal(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let handle = watch(
        move || a.get(),
        {
            let log = log.clone();
            move |value, _, _: Option<()>| {
                log.borrow_mut().push(format!("cb {value}"));
                on_watch_cleanup({
                    let log = log.clone();
                    let value = *value;
                    move || log.borrow_mut().push(format!("cleanup {value}"))
                });
            }
        },
        false,
    );

    set_a.set(1);
    set_a.set(2);
    handle.stop();

    assert_eq!(
        *log.borrow(),
        vec!["cb 1", "cleanup 1", "cb 2", "cleanup 2"]
    );
}

#[test]
fn watch_pause_parks_one_delivery() {
    let (a, set_a) = create_signal(0);
    let hits = Rc::new(RefCell::new(0));

    let handle = watch(
        move || a.get(),
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        false,
    );

    handle.pause();
    set_a.set(1);
    set_a.set(2);
    assert_eq!(*hits.borrow(), 0);

    handle.resume();
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn watch_reactive_source_traverses_one_level_by_default() {
    let list = ReactiveList::from_items([1, 2]);
    let hits = Rc::new(RefCell::new(0));

    watch(
        move || list,
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        false,
    );

    // membership changes are seen without any deep option
    list.push(3);
    assert_eq!(*hits.borrow(), 1);
}

#[derive(Clone, PartialEq)]
enum Json {
    Num(i32),
    Map(ReactiveMap<String, Json>),
}

impl DeepTrack for Json {
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        match self {
            Json::Num(_) => {}
            Json::Map(map) => map.deep_track(depth, seen),
        }
    }
}

#[test]
fn deep_watch_terminates_on_cycles() {
    let doc: ReactiveMap<String, Json> = ReactiveMap::new();
    doc.insert("self".to_string(), Json::Map(doc));

    let hits = Rc::new(RefCell::new(0));
    watch_with_options(
        move || doc,
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        WatchOptions::default().deep(WatchDepth::Unbounded),
    );

    doc.insert("x".to_string(), Json::Num(1));
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn deep_watch_observes_nested_collections() {
    let inner = ReactiveList::from_items([1]);
    let outer: ReactiveMap<String, ReactiveList<i32>> = ReactiveMap::new();
    outer.insert("xs".to_string(), inner);

    let hits = Rc::new(RefCell::new(0));
    watch_with_options(
        move || outer,
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        WatchOptions::default().deep(WatchDepth::Unbounded),
    );

    // a change two levels down is observed
    inner.push(2);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn deep_watch_respects_depth_budget() {
    let inner = ReactiveList::from_items([1]);
    let middle: ReactiveMap<String, ReactiveList<i32>> = ReactiveMap::new();
    middle.insert("inner".to_string(), inner);
    let outer: ReactiveMap<String, ReactiveMap<String, ReactiveList<i32>>> =
        ReactiveMap::new();
    outer.insert("middle".to_string(), middle);

    let hits = Rc::new(RefCell::new(0));
    watch_with_options(
        move || outer,
        {
            let hits = hits.clone();
            move |_, _, _: Option<()>| *hits.borrow_mut() += 1
        },
        WatchOptions::default().deep(WatchDepth::Levels(1)),
    );

    // below the budget: not observed
    inner.push(2);
    assert_eq!(*hits.borrow(), 0);

    // at the first level: observed
    middle.insert("other".to_string(), ReactiveList::new());
    assert_eq!(*hits.borrow(), 1);
}

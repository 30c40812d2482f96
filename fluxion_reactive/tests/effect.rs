use fluxion_reactive::*;
use std::{cell::RefCell, rc::Rc};

#[test]
fn effect_receives_its_previous_value() {
    let (a, set_a) = create_signal(1);
    let history = Rc::new(RefCell::new(Vec::new()));

    create_effect({
        let history = history.clone();
        move |prev: Option<i32>| {
            let value = a.get();
            history.borrow_mut().push((prev, value));
            value
        }
    });
    set_a.set(2);

    assert_eq!(*history.borrow(), vec![(None, 1), (Some(1), 2)]);
}

#[test]
fn dynamic_dependencies_are_dropped() {
    let (use_a, set_use_a) = create_signal(true);
    let (a, set_a) = create_signal("a");
    let (b, set_b) = create_signal("b");
    let runs = Rc::new(RefCell::new(0));

    create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            if use_a.get() {
                a.get()
            } else {
                b.get()
            }
        }
    });
    assert_eq!(*runs.borrow(), 1);

    set_use_a.set(false);
    assert_eq!(*runs.borrow(), 2);

    // the a branch is no longer read; its link was swept
    set_a.set("a2");
    assert_eq!(*runs.borrow(), 2);

    set_b.set("b2");
    assert_eq!(*runs.borrow(), 3);
}

#[test]
fn track_is_idempotent_within_one_run() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            // three reads, one link
            let _ = a.get() + a.get() + a.get();
        }
    });
    assert_eq!(*runs.borrow(), 1);

    set_a.set(1);
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn cleanup_runs_before_next_run_and_at_stop() {
    let (a, set_a) = create_signal(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let effect = create_effect({
        let log = log.clone();
        move |_| {
            let value = a.get();
            log.borrow_mut().push(format!("run {value}"));
            on_effect_cleanup({
                let log = log.clone();
                move || log.borrow_mut().push(format!("cleanup {value}"))
            });
        }
    });

    set_a.set(1);
    effect.stop();

    assert_eq!(
        *log.borrow(),
        vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
    );
}

#[test]
fn stopped_effect_never_runs_again() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    let effect = create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let _ = a.get();
        }
    });
    effect.stop();
    effect.stop(); // idempotent

    set_a.set(1);
    assert_eq!(*runs.borrow(), 1);
    assert!(!effect.is_active());
}

#[test]
fn effect_can_stop_itself_mid_run() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));
    let slot = Rc::new(RefCell::new(None::<Effect>));

    let effect = create_effect({
        let runs = runs.clone();
        let slot = slot.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let _ = a.get();
            if let Some(effect) = *slot.borrow() {
                effect.stop();
            }
        }
    });
    *slot.borrow_mut() = Some(effect);

    // second run stops the effect from within its own body
    set_a.set(1);
    assert_eq!(*runs.borrow(), 2);

    set_a.set(2);
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn paused_effect_parks_at_most_one_trigger() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    let effect = create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let _ = a.get();
        }
    });
    assert_eq!(*runs.borrow(), 1);

    effect.pause();
    set_a.set(1);
    set_a.set(2);
    set_a.set(3);
    assert_eq!(*runs.borrow(), 1);

    effect.resume();
    assert_eq!(*runs.borrow(), 2);

    // resuming again replays nothing
    effect.pause();
    effect.resume();
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn write_during_own_run_does_not_recurse() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let value = a.get();
            if value < 100 {
                set_a.set(value + 1);
            }
        }
    });
    // the self-notification was ignored: one run, one increment
    assert_eq!(*runs.borrow(), 1);
    assert_eq!(a.get_untracked(), 1);

    set_a.set(10);
    assert_eq!(*runs.borrow(), 2);
    assert_eq!(a.get_untracked(), 11);
}

#[test]
fn nested_effects_track_independently() {
    let (outer, set_outer) = create_signal(0);
    let (inner, set_inner) = create_signal(0);
    let outer_runs = Rc::new(RefCell::new(0));
    let inner_runs = Rc::new(RefCell::new(0));

    create_effect({
        let outer_runs = outer_runs.clone();
        let inner_runs = inner_runs.clone();
        move |_| {
            *outer_runs.borrow_mut() += 1;
            let _ = outer.get();
            create_effect({
                let inner_runs = inner_runs.clone();
                move |_| {
                    *inner_runs.borrow_mut() += 1;
                    let _ = inner.get();
                }
            });
        }
    });
    assert_eq!((*outer_runs.borrow(), *inner_runs.borrow()), (1, 1));

    set_inner.set(1);
    assert_eq!(*outer_runs.borrow(), 1);
    assert_eq!(*inner_runs.borrow(), 2);

    set_outer.set(1);
    assert_eq!(*outer_runs.borrow(), 2);
}

#[test]
fn on_stop_hook_fires_once() {
    let (a, _) = create_signal(0);
    let stopped = Rc::new(RefCell::new(0));

    let effect = create_effect(move |_| {
        let _ = a.get();
    });
    effect.on_stop({
        let stopped = stopped.clone();
        move || *stopped.borrow_mut() += 1
    });

    effect.stop();
    effect.stop();
    assert_eq!(*stopped.borrow(), 1);
}

use fluxion_reactive::*;
use std::{cell::RefCell, rc::Rc};

#[test]
fn stopping_a_scope_stops_its_effects() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    let scope = Scope::new();
    let effect = scope.run(|| {
        create_effect({
            let runs = runs.clone();
            move |_| {
                *runs.borrow_mut() += 1;
                let _ = a.get();
            }
        })
    });
    assert_eq!(*runs.borrow(), 1);

    scope.stop();
    assert!(!effect.is_active());
    assert!(!scope.is_alive());

    set_a.set(1);
    assert_eq!(*runs.borrow(), 1);
}

#[test]
fn scope_disposes_owned_signals() {
    let scope = Scope::new();
    let (count, set_count) = scope.run(|| create_signal(5));

    assert_eq!(count.get(), 5);
    scope.stop();

    assert_eq!(count.try_get(), None);
    assert_eq!(set_count.try_set(6), None);
}

#[test]
fn child_scopes_stop_with_their_parent() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    let parent = Scope::new();
    let child = parent.run(|| {
        let child = Scope::new();
        child.run(|| {
            create_effect({
                let runs = runs.clone();
                move |_| {
                    *runs.borrow_mut() += 1;
                    let _ = a.get();
                }
            });
        });
        child
    });

    parent.stop();
    assert!(!child.is_alive());

    set_a.set(1);
    assert_eq!(*runs.borrow(), 1);
}

#[test]
fn stopping_a_child_detaches_it_from_the_parent() {
    let parent = Scope::new();
    let (first, second, third) = parent.run(|| {
        (Scope::new(), Scope::new(), Scope::new())
    });

    // remove the middle child; the swapped-in sibling keeps working
    second.stop();
    assert!(first.is_alive());
    assert!(third.is_alive());

    parent.stop();
    assert!(!first.is_alive());
    assert!(!third.is_alive());
}

#[test]
fn cleanup_callbacks_run_on_stop() {
    let log = Rc::new(RefCell::new(Vec::new()));

    let scope = Scope::new();
    scope.run(|| {
        on_scope_cleanup({
            let log = log.clone();
            move || log.borrow_mut().push("first")
        });
        on_scope_cleanup({
            let log = log.clone();
            move || log.borrow_mut().push("second")
        });
    });
    assert!(log.borrow().is_empty());

    scope.stop();
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

#[test]
fn pause_and_resume_apply_recursively() {
    let (a, set_a) = create_signal(0);
    let outer_runs = Rc::new(RefCell::new(0));
    let inner_runs = Rc::new(RefCell::new(0));

    let scope = Scope::new();
    scope.run(|| {
        create_effect({
            let outer_runs = outer_runs.clone();
            move |_| {
                *outer_runs.borrow_mut() += 1;
                let _ = a.get();
            }
        });
        let child = Scope::new();
        child.run(|| {
            create_effect({
                let inner_runs = inner_runs.clone();
                move |_| {
                    *inner_runs.borrow_mut() += 1;
                    let _ = a.get();
                }
            });
        });
    });
    assert_eq!((*outer_runs.borrow(), *inner_runs.borrow()), (1, 1));

    scope.pause();
    set_a.set(1);
    set_a.set(2);
    assert_eq!((*outer_runs.borrow(), *inner_runs.borrow()), (1, 1));

    scope.resume();
    assert_eq!((*outer_runs.borrow(), *inner_runs.borrow()), (2, 2));
}

#[test]
fn detached_scope_survives_enclosing_scope() {
    let parent = Scope::new();
    let detached = parent.run(Scope::detached);

    parent.stop();
    assert!(detached.is_alive());

    detached.stop();
    assert!(!detached.is_alive());
}

#[test]
fn run_restores_previously_active_scope() {
    let outer = Scope::new();
    let inner = Scope::new();

    let (created_in_outer, _set) = outer.run(|| {
        inner.run(|| {
            // owned by `inner`
            create_signal(1)
        });
        // owned by `outer` again after inner.run returns
        create_signal(2)
    });

    inner.stop();
    assert_eq!(created_in_outer.try_get(), Some(2));

    outer.stop();
    assert_eq!(created_in_outer.try_get(), None);
}

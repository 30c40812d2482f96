use fluxion_reactive::*;
use std::{cell::RefCell, rc::Rc};

#[test]
fn signal_get_set_update() {
    let (count, set_count) = create_signal(0);

    assert_eq!(count.get(), 0);
    set_count.set(1);
    assert_eq!(count.get(), 1);
    set_count.update(|n| *n += 1);
    assert_eq!(count.get(), 2);
}

#[test]
fn rw_signal_split() {
    let count = create_rw_signal(0);
    let (get_count, set_count) = count.split();

    assert_eq!(count.get(), 0);
    set_count.set(1);
    assert_eq!(get_count.get(), 1);
    assert_eq!(count.get(), 1);
}

#[test]
fn with_borrows_without_cloning() {
    let (name, set_name) = create_signal("Alice".to_string());

    assert_eq!(name.with(|n| n.len()), 5);
    set_name.update(|n| n.push('!'));
    assert_eq!(name.with(|n| n.clone()), "Alice!");
}

#[test]
fn unrelated_write_does_not_rerun_subscriber() {
    let (a, set_a) = create_signal(1);
    let (_b, set_b) = create_signal(2);
    let sink = Rc::new(RefCell::new(Vec::new()));

    create_effect({
        let sink = sink.clone();
        move |_| sink.borrow_mut().push(a.get())
    });
    assert_eq!(*sink.borrow(), vec![1]);

    set_b.set(99);
    assert_eq!(*sink.borrow(), vec![1]);

    set_a.set(7);
    assert_eq!(*sink.borrow(), vec![1, 7]);
}

#[test]
fn untracked_read_does_not_subscribe() {
    let (a, set_a) = create_signal(0);
    let (b, set_b) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let _ = a.get();
            let _ = untrack(|| b.get());
        }
    });
    assert_eq!(*runs.borrow(), 1);

    set_b.set(1);
    assert_eq!(*runs.borrow(), 1);

    set_a.set(1);
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn get_untracked_inside_effect() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let _ = a.get_untracked();
        }
    });
    set_a.set(5);
    assert_eq!(*runs.borrow(), 1);
}

#[test]
fn update_untracked_does_not_notify() {
    let (a, set_a) = create_signal(0);
    let runs = Rc::new(RefCell::new(0));

    create_effect({
        let runs = runs.clone();
        move |_| {
            *runs.borrow_mut() += 1;
            let _ = a.get();
        }
    });

    set_a.update_untracked(|n| *n = 10);
    assert_eq!(*runs.borrow(), 1);
    // the silent write is still visible
    assert_eq!(a.get_untracked(), 10);
}

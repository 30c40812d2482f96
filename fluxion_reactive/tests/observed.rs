use fluxion_reactive::*;
use std::{cell::RefCell, rc::Rc};

fn counter() -> (Rc<RefCell<usize>>, impl Fn() + Clone) {
    let count = Rc::new(RefCell::new(0));
    let bump = {
        let count = count.clone();
        move || *count.borrow_mut() += 1
    };
    (count, bump)
}

#[test]
fn map_tracks_reads_per_key() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();
    map.insert("a".to_string(), 1);
    map.insert("b".to_string(), 2);

    let (a_runs, bump_a) = counter();
    create_effect(move |_| {
        bump_a();
        let _ = map.get(&"a".to_string());
    });
    assert_eq!(*a_runs.borrow(), 1);

    // writing another key does not disturb this subscriber
    map.insert("b".to_string(), 20);
    assert_eq!(*a_runs.borrow(), 1);

    map.insert("a".to_string(), 10);
    assert_eq!(*a_runs.borrow(), 2);

    // overwriting with an equal value notifies nobody
    map.insert("a".to_string(), 10);
    assert_eq!(*a_runs.borrow(), 2);
}

#[test]
fn map_add_and_delete_invalidate_iteration() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();
    map.insert("a".to_string(), 1);

    let (len_runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = map.len();
    });
    assert_eq!(*len_runs.borrow(), 1);

    // a value overwrite is not a membership change
    map.insert("a".to_string(), 2);
    assert_eq!(*len_runs.borrow(), 1);

    map.insert("b".to_string(), 1);
    assert_eq!(*len_runs.borrow(), 2);

    map.remove(&"a".to_string());
    assert_eq!(*len_runs.borrow(), 3);
}

#[test]
fn map_key_set_ignores_value_overwrites() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();
    map.insert("a".to_string(), 1);

    let (key_runs, bump_keys) = counter();
    create_effect(move |_| {
        bump_keys();
        let _ = map.keys();
    });
    let (values_runs, bump_values) = counter();
    create_effect(move |_| {
        bump_values();
        let _ = map.values();
    });
    assert_eq!((*key_runs.borrow(), *values_runs.borrow()), (1, 1));

    // SET: values see it, the key set does not
    map.insert("a".to_string(), 2);
    assert_eq!((*key_runs.borrow(), *values_runs.borrow()), (1, 2));

    // ADD: both see it
    map.insert("b".to_string(), 1);
    assert_eq!((*key_runs.borrow(), *values_runs.borrow()), (2, 3));
}

#[test]
fn map_clear_notifies_every_tracked_key() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();
    map.insert("a".to_string(), 1);
    map.insert("b".to_string(), 2);

    let (a_runs, bump_a) = counter();
    create_effect(move |_| {
        bump_a();
        let _ = map.get(&"a".to_string());
    });
    let (b_runs, bump_b) = counter();
    create_effect(move |_| {
        bump_b();
        let _ = map.get(&"b".to_string());
    });

    map.clear();
    assert_eq!((*a_runs.borrow(), *b_runs.borrow()), (2, 2));
    assert_eq!(map.len(), 0);
}

#[test]
fn map_tracks_missing_keys() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();

    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = map.get(&"later".to_string());
    });
    assert_eq!(*runs.borrow(), 1);

    // the key arriving is visible to the subscriber that saw it missing
    map.insert("later".to_string(), 1);
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn map_update_mutates_in_place() {
    let map: ReactiveMap<String, Vec<i32>> = ReactiveMap::new();
    map.insert("xs".to_string(), vec![1]);

    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = map.get(&"xs".to_string());
    });

    map.update(&"xs".to_string(), |xs| xs.push(2));
    assert_eq!(*runs.borrow(), 2);
    assert_eq!(map.get(&"xs".to_string()), Some(vec![1, 2]));
}

#[test]
fn read_only_map_shares_identity_and_rejects_writes() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();
    map.insert("a".to_string(), 1);

    let view = map.read_only();
    assert!(view.is_read_only());
    assert_eq!(view.inner(), map);
    assert_eq!(view.get(&"a".to_string()), Some(1));

    // the write never reaches the target and notifies nobody
    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = map.get(&"a".to_string());
    });
    view.insert("a".to_string(), 99);
    assert_eq!(*runs.borrow(), 1);
    assert_eq!(map.get(&"a".to_string()), Some(1));
}

#[test]
fn list_tracks_reads_per_index() {
    let list = ReactiveList::from_items([10, 20, 30]);

    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = list.get(0);
    });

    list.set(1, 21);
    assert_eq!(*runs.borrow(), 1);

    list.set(0, 11);
    assert_eq!(*runs.borrow(), 2);

    // equal write is silent
    list.set(0, 11);
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn list_length_and_iteration_markers() {
    let list = ReactiveList::from_items([1, 2, 3]);

    let (len_runs, bump_len) = counter();
    create_effect(move |_| {
        bump_len();
        let _ = list.len();
    });
    let (_sum_runs, bump_sum) = counter();
    let sum = Rc::new(RefCell::new(0));
    create_effect({
        let sum = sum.clone();
        move |_| {
            bump_sum();
            *sum.borrow_mut() = list.to_vec().into_iter().sum();
        }
    });
    assert_eq!(*sum.borrow(), 6);

    // an in-place overwrite changes content but not length
    list.set(0, 100);
    assert_eq!(*len_runs.borrow(), 1);
    assert_eq!(*sum.borrow(), 105);

    list.push(4);
    assert_eq!(*len_runs.borrow(), 2);
    assert_eq!(*sum.borrow(), 109);

    list.pop();
    assert_eq!(*len_runs.borrow(), 3);
    assert_eq!(*sum.borrow(), 105);
}

#[test]
fn list_insert_shifts_tracked_positions() {
    let list = ReactiveList::from_items(["b", "c"]);

    let (runs, bump) = counter();
    let seen = Rc::new(RefCell::new(None));
    create_effect({
        let seen = seen.clone();
        move |_| {
            bump();
            *seen.borrow_mut() = list.get(0);
        }
    });
    assert_eq!(*seen.borrow(), Some("b"));

    list.insert(0, "a");
    assert_eq!(*seen.borrow(), Some("a"));
    assert_eq!(*runs.borrow(), 2);

    list.remove(0);
    assert_eq!(*seen.borrow(), Some("b"));
}

#[test]
fn list_splice_replaces_a_range() {
    let list = ReactiveList::from_items([1, 2, 3, 4]);

    let removed = list.splice(1, 2, [20, 30, 40]);
    assert_eq!(removed, vec![2, 3]);
    assert_eq!(list.to_vec(), vec![1, 20, 30, 40, 4]);
}

#[test]
fn list_growth_inside_subscriber_does_not_self_trigger() {
    let list = ReactiveList::from_items([1]);
    let (trigger, _) = create_signal(0);

    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = trigger.get();
        // reading then growing must not loop through the length dep
        let _ = list.len();
        list.push(0);
    });
    assert_eq!(*runs.borrow(), 1);
}

#[test]
fn set_membership_tracking() {
    let set = ReactiveSet::new();
    set.add("a");

    let (runs, bump) = counter();
    let has = Rc::new(RefCell::new(false));
    create_effect({
        let has = has.clone();
        move |_| {
            bump();
            *has.borrow_mut() = set.contains(&"b");
        }
    });
    assert!(!*has.borrow());

    // adding an unrelated member is silent
    set.add("c");
    assert_eq!(*runs.borrow(), 1);

    set.add("b");
    assert!(*has.borrow());
    assert_eq!(*runs.borrow(), 2);

    // re-adding an existing member is silent
    set.add("b");
    assert_eq!(*runs.borrow(), 2);

    set.remove(&"b");
    assert!(!*has.borrow());
}

#[test]
fn set_iteration_marker() {
    let set = ReactiveSet::from_values([1, 2]);

    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        let _ = set.len();
    });

    set.add(3);
    assert_eq!(*runs.borrow(), 2);
    set.clear();
    assert_eq!(*runs.borrow(), 3);
    assert_eq!(set.len(), 0);
}

#[test]
fn raw_access_is_untracked() {
    let map: ReactiveMap<String, i32> = ReactiveMap::new();
    map.insert("a".to_string(), 1);

    let (runs, bump) = counter();
    create_effect(move |_| {
        bump();
        map.with_raw(|raw| {
            let _ = raw.len();
        });
    });

    map.insert("b".to_string(), 2);
    map.insert("a".to_string(), 3);
    assert_eq!(*runs.borrow(), 1);
}

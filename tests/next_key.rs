use hashtab::{CreateFlags, HashTable, UpdateFlags};
use std::collections::HashSet;

fn key(k: u32) -> [u8; 4] {
    k.to_ne_bytes()
}

fn walk(table: &HashTable) -> Vec<u32> {
    let guard = table.guard();
    let mut keys = Vec::new();
    let mut next = table.get_next_key(None, &guard);
    while let Some(k) = next {
        keys.push(u32::from_ne_bytes(k.try_into().unwrap()));
        next = table.get_next_key(Some(k), &guard);
    }
    keys
}

#[test]
fn empty() {
    let table = HashTable::new(4, 4, 16, CreateFlags::NONE).unwrap();
    let guard = table.guard();
    assert_eq!(table.get_next_key(None, &guard), None);
    assert_eq!(table.get_next_key(Some(&key(1)[..]), &guard), None);
}

#[test]
fn single_key() {
    let table = HashTable::new(4, 4, 16, CreateFlags::NONE).unwrap();
    let guard = table.guard();
    table.update(&key(7), &key(0), UpdateFlags::ANY, &guard).unwrap();
    assert_eq!(table.get_next_key(None, &guard), Some(&key(7)[..]));
    assert_eq!(table.get_next_key(Some(&key(7)[..]), &guard), None);
    // with a single key there is never a next one, whatever we pass
    assert_eq!(table.get_next_key(Some(&key(8)[..]), &guard), None);
}

#[test]
fn visits_every_key_once() {
    let table = HashTable::new(4, 4, 100, CreateFlags::NONE).unwrap();
    {
        let guard = table.guard();
        for i in 0..100 {
            table.update(&key(i), &key(i), UpdateFlags::ANY, &guard).unwrap();
        }
    }

    let keys = walk(&table);
    assert_eq!(keys.len(), 100);
    let unique: HashSet<_> = keys.iter().copied().collect();
    assert_eq!(unique, (0..100).collect::<HashSet<u32>>());
}

#[test]
fn follows_iteration_order() {
    let table = HashTable::new(4, 4, 64, CreateFlags::NONE).unwrap();
    let guard = table.guard();
    for i in 0..40 {
        table.update(&key(i), &key(i), UpdateFlags::ANY, &guard).unwrap();
    }
    let keys: Vec<u32> = table
        .keys(&guard)
        .map(|k| u32::from_ne_bytes(k.try_into().unwrap()))
        .collect();
    assert_eq!(walk(&table), keys);
}

#[test]
fn after_deletes() {
    let table = HashTable::new(4, 4, 64, CreateFlags::NONE).unwrap();
    {
        let guard = table.guard();
        for i in 0..64 {
            table.update(&key(i), &key(i), UpdateFlags::ANY, &guard).unwrap();
        }
        for i in (0..64).filter(|i| i % 3 == 0) {
            table.delete(&key(i), &guard);
        }
    }

    let mut keys = walk(&table);
    keys.sort_unstable();
    assert_eq!(keys, (0..64).filter(|i| i % 3 != 0).collect::<Vec<u32>>());
}

#[test]
fn missing_key_restarts() {
    let table = HashTable::new(4, 4, 16, CreateFlags::NONE).unwrap();
    let guard = table.guard();
    for i in 0..4 {
        table.update(&key(i), &key(i), UpdateFlags::ANY, &guard).unwrap();
    }
    let first = table.get_next_key(None, &guard);
    assert!(first.is_some());
    assert_eq!(table.get_next_key(Some(&key(1000)[..]), &guard), first);
}

#[test]
fn key_deleted_mid_walk() {
    let table = HashTable::new(4, 4, 16, CreateFlags::NONE).unwrap();
    let guard = table.guard();
    for i in 0..8 {
        table.update(&key(i), &key(i), UpdateFlags::ANY, &guard).unwrap();
    }

    let first = table.get_next_key(None, &guard).unwrap();
    let second = table.get_next_key(Some(first), &guard).unwrap();
    table.delete(first, &guard);

    // `first` is gone from the table (though still readable through our guard), so the walk
    // starts over, now at what used to be the second key
    assert_eq!(table.get_next_key(Some(first), &guard), Some(second));
}

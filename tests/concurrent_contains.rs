use hashtab::{CreateFlags, Error, HashTable, UpdateFlags};
use std::{sync::Arc, thread};

/// Number of entries for each thread to place in the table.
const NUM_ENTRIES: usize = 16;

/// Number of iterations for each test
const ITERATIONS: usize = 256;

/// Number of rounds every thread performs per entry.
const ROUNDS: usize = 32;

#[test]
fn test_concurrent_contains_key() {
    let table = HashTable::new(8, 8, NUM_ENTRIES as u32, CreateFlags::NONE).unwrap();
    let mut content = [0; NUM_ENTRIES];
    {
        let guard = table.guard();
        for k in 0..NUM_ENTRIES {
            let k = k as u64;
            table
                .update(&k.to_ne_bytes(), &k.to_ne_bytes(), UpdateFlags::ANY, &guard)
                .unwrap();
            content[k as usize] = k;
        }
    }
    test(content, Arc::new(table));
}

fn test(content: [u64; NUM_ENTRIES], table: Arc<HashTable>) {
    for _ in 0..ITERATIONS {
        test_once(content, table.clone());
    }
}

fn test_once(content: [u64; NUM_ENTRIES], table: Arc<HashTable>) {
    let mut threads = Vec::new();
    for _ in 0..num_cpus::get().min(8) {
        let table = table.clone();
        let handle = thread::spawn(move || {
            let guard = table.guard();
            for i in 0..NUM_ENTRIES * ROUNDS {
                let key = content[i % content.len()].to_ne_bytes();
                assert!(table.contains_key(&key, &guard));
            }
        });
        threads.push(handle);
    }
    for t in threads {
        t.join().expect("failed to join thread");
    }
}

#[test]
fn test_contains_while_replacing() {
    // leave room: at max_entries even replacements fail with `Busy`
    let max_entries = 2 * NUM_ENTRIES as u32;
    let table = Arc::new(HashTable::new(8, 8, max_entries, CreateFlags::NONE).unwrap());
    for k in 0..NUM_ENTRIES as u64 {
        table
            .update(&k.to_ne_bytes(), &0u64.to_ne_bytes(), UpdateFlags::ANY, &table.guard())
            .unwrap();
    }

    let writer = {
        let table = table.clone();
        thread::spawn(move || {
            for round in 1..=ROUNDS as u64 * 8 {
                for k in 0..NUM_ENTRIES as u64 {
                    // records come back to the pool only once reclaimed, so running dry is
                    // transient; retry until the update goes through
                    loop {
                        let guard = table.guard();
                        let key = k.to_ne_bytes();
                        let value = round.to_ne_bytes();
                        match table.update(&key, &value, UpdateFlags::EXIST, &guard) {
                            Ok(()) => break,
                            Err(Error::OutOfMemory) => thread::yield_now(),
                            Err(e) => panic!("update failed: {}", e),
                        }
                    }
                }
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..num_cpus::get().min(4) {
        let table = table.clone();
        readers.push(thread::spawn(move || {
            for _ in 0..ROUNDS * 8 {
                let guard = table.guard();
                for k in 0..NUM_ENTRIES as u64 {
                    // a key being replaced never disappears
                    assert!(table.contains_key(&k.to_ne_bytes(), &guard));
                }
            }
        }));
    }

    writer.join().expect("failed to join writer");
    for r in readers {
        r.join().expect("failed to join reader");
    }
    assert_eq!(table.len(), NUM_ENTRIES);
}

use crate::alloc::Block;
use crate::raw::RawTable;
use crate::reclaim::{Atomic, Guard, Shared};
use parking_lot::Mutex;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// One hash slot: a writer lock and an epoch-protected list of the elements hashing to it.
///
/// Readers walk `head` without taking `lock`. Only a holder of `lock` may change the list.
#[derive(Debug)]
pub(crate) struct Bucket {
    pub(crate) head: Atomic<HashElem>,
    pub(crate) lock: Mutex<()>,
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            head: Atomic::null(),
            lock: Mutex::new(()),
        }
    }

    /// Finds the element holding `key`, or null.
    pub(crate) fn find<'g>(&'g self, key: &[u8], guard: &'g Guard<'_>) -> Shared<'g, HashElem> {
        let mut node = self.head.load(Ordering::Acquire, guard);
        // safety: every element we reach was linked when we loaded it under `guard`, and an
        // element is only dropped once all guards that could have seen it are gone.
        while let Some(n) = unsafe { node.as_ref() } {
            if n.key() == key {
                return node;
            }
            node = n.next.load(Ordering::Acquire, guard);
        }
        Shared::null()
    }

    /// Links `new` in front of the current head.
    ///
    /// The bucket lock must be held.
    pub(crate) fn push_front<'g>(&'g self, new: Shared<'g, HashElem>, guard: &'g Guard<'_>) {
        let head = self.head.load(Ordering::Acquire, guard);
        // safety: `new` has not been published yet, so we are its only user.
        unsafe { new.deref() }.next.store(head, Ordering::Relaxed);
        self.head.store(new, Ordering::Release);
    }

    /// Splices `target` out of the list. Its own `next` is left intact so that readers
    /// currently positioned on it can continue their traversal.
    ///
    /// The bucket lock must be held and `target` must be linked in this bucket.
    pub(crate) fn unlink<'g>(&'g self, target: Shared<'g, HashElem>, guard: &'g Guard<'_>) {
        // safety: target is linked, and we hold the lock, so nobody can retire it under us.
        let next = unsafe { target.deref() }.next.load(Ordering::Acquire, guard);
        let mut link = &self.head;
        loop {
            let current = link.load(Ordering::Acquire, guard);
            if current == target {
                link.store(next, Ordering::Release);
                return;
            }
            // safety: same as above for every element still linked in this bucket.
            match unsafe { current.as_ref() } {
                Some(elem) => link = &elem.next,
                None => unreachable!("unlinked element is not in its bucket"),
            }
        }
    }
}

/// A key/value element.
///
/// The key and the value live back to back in a single fixed-size record taken from the
/// table's [`BlockAllocator`](crate::alloc::BlockAllocator).
pub(crate) struct HashElem {
    pub(crate) next: Atomic<HashElem>,
    /// The table this element must be released into. Null while the element is linked;
    /// published right before the element is retired.
    owner: AtomicPtr<RawTable>,
    key_size: usize,
    block: Option<Block>,
}

impl HashElem {
    /// Builds an element from a fresh record, copying `key` and `value` into it.
    pub(crate) fn new(mut block: Block, key: &[u8], value: &[u8]) -> Self {
        debug_assert_eq!(block.len(), key.len() + value.len());
        let (k, v) = block.split_at_mut(key.len());
        k.copy_from_slice(key);
        v.copy_from_slice(value);
        Self {
            next: Atomic::null(),
            owner: AtomicPtr::new(ptr::null_mut()),
            key_size: key.len(),
            block: Some(block),
        }
    }

    fn bytes(&self) -> &[u8] {
        self.block.as_deref().unwrap_or_default()
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.bytes()[..self.key_size]
    }

    pub(crate) fn value(&self) -> &[u8] {
        &self.bytes()[self.key_size..]
    }

    /// Takes back the record of an element that was never published.
    pub(crate) fn into_block(mut self) -> Option<Block> {
        self.block.take()
    }

    /// Records the table that the deferred release must return this element to.
    ///
    /// Must be called, together with taking a reference on `owner`, before the element is retired.
    pub(crate) fn set_owner(&self, owner: *const RawTable) {
        self.owner.store(owner as *mut RawTable, Ordering::Release);
    }
}

impl Drop for HashElem {
    fn drop(&mut self) {
        // an element that never got retired (never published, or torn down together with its
        // table) has no owner; its record simply goes away with it.
        let owner = *self.owner.get_mut();
        if owner.is_null() {
            return;
        }

        // safety: the owner took a reference on our behalf in `set_owner`'s caller, so it is
        // still alive until we release that reference below.
        let table = unsafe { &*owner };
        if let Some(block) = self.block.take() {
            table.allocator().free(block);
        }
        // safety: this is the reference taken for this element, and it is released exactly once.
        unsafe { RawTable::release(owner) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclaim::{Collector, Linked};

    fn elem(k: u8) -> HashElem {
        HashElem::new(vec![0; 2].into_boxed_slice(), &[k], &[k + 100])
    }

    fn keys(bucket: &Bucket, guard: &Guard<'_>) -> Vec<u8> {
        let mut keys = Vec::new();
        let mut node = bucket.head.load(Ordering::Acquire, guard);
        while let Some(n) = unsafe { node.as_ref() } {
            keys.push(n.key()[0]);
            node = n.next.load(Ordering::Acquire, guard);
        }
        keys
    }

    #[test]
    fn key_and_value_share_one_record() {
        let e = elem(7);
        assert_eq!(e.key(), &[7]);
        assert_eq!(e.value(), &[107]);
        assert_eq!(e.into_block().as_deref(), Some(&[7u8, 107][..]));
    }

    #[test]
    fn push_find_unlink() {
        let collector = Collector::new();
        let guard = collector.enter();
        let mut bucket = Bucket::new();

        let nodes: Vec<_> = (1..=3)
            .map(|k| {
                let n = Shared::boxed(elem(k), &collector);
                bucket.push_front(n, &guard);
                n
            })
            .collect();
        assert_eq!(keys(&bucket, &guard), vec![3, 2, 1]);
        assert!(bucket.find(&[2], &guard) == nodes[1]);
        assert!(bucket.find(&[9], &guard).is_null());

        // middle, then head, then the last one
        bucket.unlink(nodes[1], &guard);
        assert_eq!(keys(&bucket, &guard), vec![3, 1]);
        // an unlinked element keeps its successor for readers still positioned on it
        let next = unsafe { nodes[1].deref() }.next.load(Ordering::Acquire, &guard);
        assert!(next == nodes[0]);

        bucket.unlink(nodes[2], &guard);
        assert_eq!(keys(&bucket, &guard), vec![1]);
        bucket.unlink(nodes[0], &guard);
        assert!(keys(&bucket, &guard).is_empty());

        for n in nodes {
            // safety: nothing links to these anymore, and they were never retired.
            drop(Linked::into_inner(*unsafe { n.into_box() }));
        }
        assert!(unsafe { bucket.head.take_box() }.is_none());
    }
}

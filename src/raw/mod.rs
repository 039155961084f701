use crate::alloc::BlockAllocator;
use crate::node::{Bucket, HashElem};
use crate::reclaim::{Guard, Linked, RetireShared, Shared};
use crate::{CreateFlags, Error};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

/// Number of retired elements a thread accumulates before handing them to reclamation.
pub(crate) const RECLAIM_BATCH: usize = 32;

static NCPU_INITIALIZER: Once = Once::new();
static NCPU: AtomicUsize = AtomicUsize::new(0);

/// The shared state of one hashtable: its buckets, its element pool and its reference count.
///
/// A `RawTable` is always heap allocated and reached through a raw pointer. It holds one
/// reference for the owning [`HashTable`](crate::HashTable) plus one for every retired element
/// whose deferred release has not run yet. Whoever drops the last reference frees it.
#[derive(Debug)]
pub(crate) struct RawTable {
    buckets: Box<[Bucket]>,
    allocator: BlockAllocator,

    /// Number of linked elements.
    count: AtomicUsize,

    /// Outstanding references to this table; see the type-level docs.
    live_refs: AtomicUsize,

    key_size: usize,
    value_size: usize,
    max_entries: usize,
    elem_size: u32,
}

#[cfg(test)]
thread_local! {
    /// Number of tables freed on this thread.
    pub(crate) static RELEASED: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

impl RawTable {
    pub(crate) fn new(
        key_size: u32,
        value_size: u32,
        max_entries: u32,
        flags: CreateFlags,
    ) -> Result<Self, Error> {
        if key_size == 0 || max_entries == 0 {
            return Err(Error::InvalidArgument);
        }

        let header = mem::size_of::<Linked<HashElem>>() as u64;
        let elem_size = u32::try_from(u64::from(key_size) + u64::from(value_size) + header)
            .map_err(|_| Error::TooLarge)?;

        // a power of two lets us pick buckets with a mask instead of a division
        let nbuckets = max_entries
            .checked_next_power_of_two()
            .ok_or(Error::TooLarge)? as usize;
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(nbuckets).map_err(|_| Error::OutOfMemory)?;
        buckets.resize_with(nbuckets, Bucket::new);

        // elements replaced or deleted stay allocated until reclaimed, so every thread that may
        // be sitting on a batch of retired elements gets headroom beyond `max_entries`.
        let max_entries = max_entries as usize;
        let limit = max_entries + concurrency_degree() * RECLAIM_BATCH;
        let mut allocator = BlockAllocator::new(key_size as usize + value_size as usize, limit)?;
        if !flags.contains(CreateFlags::NO_PREALLOC) {
            allocator.prealloc(limit)?;
        }

        Ok(Self {
            buckets: buckets.into_boxed_slice(),
            allocator,
            count: AtomicUsize::new(0),
            live_refs: AtomicUsize::new(1),
            key_size: key_size as usize,
            value_size: value_size as usize,
            max_entries,
            elem_size,
        })
    }

    #[inline]
    pub(crate) fn bucket_index(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    #[inline]
    pub(crate) fn bucket(&self, hash: u32) -> &Bucket {
        &self.buckets[self.bucket_index(hash)]
    }

    #[inline]
    pub(crate) fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub(crate) fn allocator(&self) -> &BlockAllocator {
        &self.allocator
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn key_size(&self) -> usize {
        self.key_size
    }

    pub(crate) fn value_size(&self) -> usize {
        self.value_size
    }

    pub(crate) fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub(crate) fn elem_size(&self) -> u32 {
        self.elem_size
    }

    /// Claims room for one more element, failing if the table is full.
    ///
    /// Must be called with the lock held of the bucket the element goes into.
    pub(crate) fn try_reserve_slot(&self) -> bool {
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_entries).then_some(n + 1)
            })
            .is_ok()
    }

    pub(crate) fn release_slot(&self) {
        let prev = self.count.fetch_sub(1, Ordering::SeqCst);
        debug_assert_ne!(prev, 0);
    }

    /// Number of retired elements whose release has not run yet.
    pub(crate) fn pending_releases(&self) -> usize {
        self.live_refs.load(Ordering::Acquire).saturating_sub(1)
    }

    /// Hands an element that was just unlinked over to deferred reclamation.
    ///
    /// The element's `Drop` later returns its record to our allocator and gives back the
    /// reference taken here.
    ///
    /// # Safety
    ///
    /// `elem` must have been unlinked from its bucket under the bucket lock, must not have been
    /// retired before, and `self` must be the table it was linked in.
    pub(crate) unsafe fn retire<'g>(&self, elem: Shared<'g, HashElem>, guard: &'g Guard<'_>) {
        // the reference has to exist before the element can possibly be reclaimed
        self.live_refs.fetch_add(1, Ordering::AcqRel);
        // safety: elem is valid until we retire it just below.
        unsafe { elem.deref() }.set_owner(self);
        // safety: elem is no longer reachable from any bucket, so no new reader can find it.
        unsafe { guard.retire_shared(elem) };
    }

    /// Drops one reference to the table behind `table`, freeing it if that was the last one.
    ///
    /// # Safety
    ///
    /// `table` must come from `Box::into_raw`, and the caller must own one of its references,
    /// which it gives up by calling this. The caller must not touch the table afterwards.
    pub(crate) unsafe fn release(table: *const RawTable) {
        // safety: the caller's reference keeps the table alive up to here.
        let prev = unsafe { &*table }.live_refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert_ne!(prev, 0, "hashtable released more often than referenced");
        if prev == 1 {
            // safety: that was the last reference, so nobody else can reach the table.
            drop(unsafe { Box::from_raw(table as *mut RawTable) });
        }
    }
}

impl Drop for RawTable {
    fn drop(&mut self) {
        // safety: we have &mut self, and the last reference is gone, so no reader or writer can
        // still reach any linked element. we own all of them.
        for bucket in self.buckets.iter_mut() {
            let mut next = unsafe { bucket.head.take_box() };
            while let Some(elem) = next {
                let mut elem = Linked::into_inner(*elem);
                next = unsafe { elem.next.take_box() };
            }
        }

        tracing::debug!(
            nbuckets = self.buckets.len(),
            elem_size = self.elem_size,
            "hashtable released"
        );

        #[cfg(test)]
        RELEASED.with(|r| r.set(r.get() + 1));
    }
}

#[cfg(not(miri))]
#[inline]
/// Returns the number of CPUs in the machine (_O(1)_).
pub(crate) fn concurrency_degree() -> usize {
    NCPU_INITIALIZER.call_once(|| NCPU.store(num_cpus::get(), Ordering::Relaxed));
    NCPU.load(Ordering::Relaxed)
}

#[cfg(miri)]
#[inline]
pub(crate) const fn concurrency_degree() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn released() -> usize {
        RELEASED.with(|r| r.get())
    }

    #[test]
    fn buckets_round_up_to_power_of_two() {
        let t = RawTable::new(4, 4, 5, CreateFlags::NONE).unwrap();
        assert_eq!(t.buckets().len(), 8);
        assert_eq!(t.bucket_index(13), 5);
        assert_eq!(t.bucket_index(u32::MAX), 7);

        let t = RawTable::new(4, 4, 1, CreateFlags::NONE).unwrap();
        assert_eq!(t.buckets().len(), 1);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(
            RawTable::new(0, 4, 4, CreateFlags::NONE).unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(
            RawTable::new(4, 4, 0, CreateFlags::NONE).unwrap_err(),
            Error::InvalidArgument
        );
        assert_eq!(
            RawTable::new(u32::MAX, 1, 4, CreateFlags::NONE).unwrap_err(),
            Error::TooLarge
        );
        assert_eq!(
            RawTable::new(4, 4, u32::MAX, CreateFlags::NONE).unwrap_err(),
            Error::TooLarge
        );
    }

    #[test]
    fn elem_size_includes_header() {
        let t = RawTable::new(4, 8, 2, CreateFlags::NONE).unwrap();
        assert!(t.elem_size() as usize > 12);
        assert_eq!(t.allocator().block_size(), 12);
    }

    #[test]
    fn preallocates_unless_asked_not_to() {
        let t = RawTable::new(4, 4, 2, CreateFlags::NONE).unwrap();
        assert_eq!(t.allocator().available(), 2 + concurrency_degree() * RECLAIM_BATCH);

        let t = RawTable::new(4, 4, 2, CreateFlags::NO_PREALLOC).unwrap();
        assert_eq!(t.allocator().available(), 0);
        assert!(t.allocator().alloc().is_ok());
    }

    #[test]
    fn slots_are_bounded() {
        let t = RawTable::new(4, 4, 2, CreateFlags::NONE).unwrap();
        assert!(t.try_reserve_slot());
        assert!(t.try_reserve_slot());
        assert!(!t.try_reserve_slot());
        assert_eq!(t.len(), 2);
        t.release_slot();
        assert!(t.try_reserve_slot());
    }

    #[test]
    fn released_immediately_without_pending() {
        let before = released();
        let t = Box::into_raw(Box::new(RawTable::new(4, 4, 2, CreateFlags::NONE).unwrap()));
        unsafe { RawTable::release(t) };
        assert_eq!(released(), before + 1);
    }

    #[test]
    fn last_pending_release_frees() {
        let before = released();
        let t = Box::into_raw(Box::new(RawTable::new(4, 4, 2, CreateFlags::NONE).unwrap()));

        // two deferred element releases are outstanding
        unsafe { &*t }.live_refs.fetch_add(2, Ordering::AcqRel);
        assert_eq!(unsafe { &*t }.pending_releases(), 2);

        // teardown is requested, but the table must stay around
        unsafe { RawTable::release(t) };
        assert_eq!(released(), before);
        assert_eq!(unsafe { &*t }.pending_releases(), 1);

        unsafe { RawTable::release(t) };
        assert_eq!(released(), before);

        // the last callback performs the release
        unsafe { RawTable::release(t) };
        assert_eq!(released(), before + 1);
    }
}

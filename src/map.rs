use crate::iter::*;
use crate::node::HashElem;
use crate::raw::{RawTable, RECLAIM_BATCH};
use crate::reclaim::{Collector, Guard, Linked, Shared};
use crate::{CreateFlags, Error, UpdateFlags};
use std::fmt::{self, Debug, Formatter};
use std::hash::{BuildHasher, Hasher};
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

/// A fixed-capacity concurrent hashtable from byte keys to byte values.
///
/// Every key is exactly [`key_size`](HashTable::key_size) bytes long and every value exactly
/// [`value_size`](HashTable::value_size) bytes. The table never holds more than
/// [`max_entries`](HashTable::max_entries) keys, and its bucket count is fixed when it is created.
///
/// Lookups and iteration never take a lock. They rely on a [`Guard`] obtained from
/// [`HashTable::guard`] (or implicitly through [`HashTable::pin`]): an element that is replaced
/// or deleted while a guard is held stays readable through that guard, and its memory is only
/// returned to the table's element pool once every guard that might have seen it is gone.
///
/// Updates and deletes lock the single bucket the key hashes to.
pub struct HashTable<S = crate::DefaultHashBuilder> {
    /// The shared table state. We hold one of its references; elements whose deferred release
    /// is still pending hold the others.
    raw: NonNull<RawTable>,

    /// Collector that all `Guard` references used for operations on this table must be tied to.
    /// Guards from any other collector would not hold back the release of our elements, so every
    /// externally supplied guard is checked against this one.
    ///
    /// Dropping the collector runs every deferred element release that is still pending.
    collector: Collector,

    build_hasher: S,
}

// safety: the raw table is only mutated through atomics and bucket locks, and elements are only
// freed through the collector, so the handle can be shared and sent like any concurrent map.
unsafe impl<S: Send> Send for HashTable<S> {}
unsafe impl<S: Sync> Sync for HashTable<S> {}

impl HashTable<crate::DefaultHashBuilder> {
    /// Creates a table for `key_size`-byte keys and `value_size`-byte values holding at most
    /// `max_entries` keys.
    ///
    /// Keys are hashed with a zero-seeded [`DefaultHashBuilder`](crate::DefaultHashBuilder), so
    /// bucket placement is the same from run to run.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `key_size` or `max_entries` is zero.
    /// - [`Error::TooLarge`] if a key, a value and the element header do not fit in a `u32`.
    /// - [`Error::OutOfMemory`] if the buckets or the element records cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use hashtab::{CreateFlags, HashTable, UpdateFlags};
    ///
    /// let table = HashTable::new(4, 8, 128, CreateFlags::NONE).unwrap();
    /// let guard = table.guard();
    /// table.update(&1u32.to_ne_bytes(), &7u64.to_ne_bytes(), UpdateFlags::ANY, &guard).unwrap();
    /// assert_eq!(table.lookup(&1u32.to_ne_bytes(), &guard), Some(&7u64.to_ne_bytes()[..]));
    /// ```
    pub fn new(
        key_size: u32,
        value_size: u32,
        max_entries: u32,
        flags: CreateFlags,
    ) -> Result<Self, Error> {
        Self::with_hasher(
            key_size,
            value_size,
            max_entries,
            flags,
            crate::default_hash_builder(),
        )
    }
}

impl<S> HashTable<S> {
    /// Creates a table like [`HashTable::new`] that uses `hash_builder` to hash keys.
    ///
    /// Only the low 32 bits of each hash are used.
    pub fn with_hasher(
        key_size: u32,
        value_size: u32,
        max_entries: u32,
        flags: CreateFlags,
        hash_builder: S,
    ) -> Result<Self, Error> {
        let raw = RawTable::new(key_size, value_size, max_entries, flags)?;
        tracing::debug!(
            key_size,
            value_size,
            max_entries,
            nbuckets = raw.buckets().len(),
            elem_size = raw.elem_size(),
            prealloc = !flags.contains(CreateFlags::NO_PREALLOC),
            "hashtable created"
        );

        Ok(Self {
            raw: NonNull::from(Box::leak(Box::new(raw))),
            collector: Collector::new().batch_size(RECLAIM_BATCH),
            build_hasher: hash_builder,
        })
    }

    #[inline]
    pub(crate) fn raw(&self) -> &RawTable {
        // safety: we hold a reference on the raw table until we are dropped.
        unsafe { self.raw.as_ref() }
    }

    /// Pin a `Guard` for use with this table.
    ///
    /// Keep in mind that for as long as you hold onto this `Guard`, you are preventing the
    /// reclamation of elements replaced or deleted in this table. Since element records come
    /// from a bounded pool, holding a guard for long while others write may make updates fail
    /// with [`Error::OutOfMemory`].
    pub fn guard(&self) -> Guard<'_> {
        self.collector.enter()
    }

    #[inline]
    pub(crate) fn check_guard(&self, guard: &Guard<'_>) {
        // guard.collector() may be `None` if it is unprotected
        if let Some(c) = guard.collector() {
            assert!(
                Collector::ptr_eq(c, &self.collector),
                "guard does not belong to this table"
            );
        }
    }

    #[inline]
    fn check_key(&self, key: &[u8]) {
        assert_eq!(
            key.len(),
            self.key_size(),
            "key length does not match the table's key size"
        );
    }

    /// Returns the number of keys in the table.
    pub fn len(&self) -> usize {
        self.raw().len()
    }

    /// Returns `true` if the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the size in bytes of every key.
    pub fn key_size(&self) -> usize {
        self.raw().key_size()
    }

    /// Returns the size in bytes of every value.
    pub fn value_size(&self) -> usize {
        self.raw().value_size()
    }

    /// Returns the maximum number of keys the table can hold.
    pub fn max_entries(&self) -> usize {
        self.raw().max_entries()
    }

    /// Returns the (fixed) number of buckets, a power of two.
    pub fn nbuckets(&self) -> usize {
        self.raw().buckets().len()
    }

    /// Returns the size of one element: key, value and bookkeeping header.
    pub fn elem_size(&self) -> u32 {
        self.raw().elem_size()
    }

    /// Returns the number of replaced or deleted elements whose memory has not been reclaimed yet.
    pub fn pending_releases(&self) -> usize {
        self.raw().pending_releases()
    }

    /// Requests teardown of the table.
    ///
    /// If no replaced or deleted element is still waiting for reclamation, the table's memory is
    /// freed right away. Otherwise it is freed by whichever pending element release runs last;
    /// all of them run before this call returns, since the table's collector goes away with it.
    ///
    /// Dropping the table has the same effect.
    pub fn deinit(self) {
        drop(self);
    }

    /// An iterator visiting all keys in bucket order.
    ///
    /// Like [`HashTable::get_next_key`], the iteration is weakly consistent: keys inserted or
    /// removed concurrently may or may not be observed.
    pub fn keys<'g>(&'g self, guard: &'g Guard<'_>) -> Keys<'g> {
        self.check_guard(guard);
        Keys::new(self.raw().buckets(), guard)
    }

    /// An iterator visiting all key/value pairs in bucket order.
    ///
    /// The iteration is weakly consistent, like [`HashTable::keys`].
    pub fn iter<'g>(&'g self, guard: &'g Guard<'_>) -> Iter<'g> {
        self.check_guard(guard);
        Iter::new(self.raw().buckets(), guard)
    }
}

#[inline]
fn check_update_flags(exists: bool, flags: UpdateFlags) -> Result<(), Error> {
    if exists {
        if flags.contains(UpdateFlags::NO_EXIST) {
            return Err(Error::AlreadyExists);
        }
    } else if flags.contains(UpdateFlags::EXIST) {
        return Err(Error::NotFound);
    }
    Ok(())
}

impl<S> HashTable<S>
where
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &[u8]) -> u32 {
        let mut h = self.build_hasher.build_hasher();
        h.write(key);
        h.finish() as u32
    }

    /// Returns `true` if the table holds `key`.
    ///
    /// # Panics
    ///
    /// If `key` is not exactly [`key_size`](HashTable::key_size) bytes long, or if `guard` was
    /// not obtained from this table.
    pub fn contains_key(&self, key: &[u8], guard: &Guard<'_>) -> bool {
        self.lookup(key, guard).is_some()
    }

    /// Returns the value stored for `key`.
    ///
    /// The returned slice stays valid for as long as `guard` is held, even if the key is
    /// replaced or deleted in the meantime. This never blocks.
    ///
    /// # Panics
    ///
    /// If `key` is not exactly [`key_size`](HashTable::key_size) bytes long, or if `guard` was
    /// not obtained from this table.
    pub fn lookup<'g>(&'g self, key: &[u8], guard: &'g Guard<'_>) -> Option<&'g [u8]> {
        self.check_guard(guard);
        self.check_key(key);

        let raw = self.raw();
        if raw.len() == 0 {
            return None;
        }

        let elem = raw.bucket(self.hash(key)).find(key, guard);
        // safety: we found the element while holding `guard`. it will not be reclaimed until
        // after `guard` is dropped, and the returned reference is bound to that lifetime.
        unsafe { elem.as_ref() }.map(|elem| elem.value())
    }

    /// Stores `value` for `key`, subject to `flags`.
    ///
    /// If the key is already present, a new element replaces the old one: the new element is
    /// linked before the old one is unlinked, so readers always find exactly one of the two.
    /// Readers that already hold the old value keep seeing it until they drop their guard.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if the table already holds `max_entries` keys. This is checked first,
    ///   so it is reported even when `key` itself is present.
    /// - [`Error::AlreadyExists`] if `flags` contains [`UpdateFlags::NO_EXIST`] and `key` is present.
    /// - [`Error::NotFound`] if `flags` contains [`UpdateFlags::EXIST`] and `key` is absent.
    /// - [`Error::OutOfMemory`] if the element pool is exhausted. Records of replaced and
    ///   deleted elements come back to the pool once reclaimed, so this can be transient.
    ///
    /// # Panics
    ///
    /// If `key` or `value` has the wrong length, or if `guard` was not obtained from this table.
    pub fn update(
        &self,
        key: &[u8],
        value: &[u8],
        flags: UpdateFlags,
        guard: &Guard<'_>,
    ) -> Result<(), Error> {
        self.check_guard(guard);
        self.check_key(key);
        assert_eq!(
            value.len(),
            self.value_size(),
            "value length does not match the table's value size"
        );

        let raw = self.raw();
        if raw.len() >= raw.max_entries() {
            tracing::trace!(max_entries = raw.max_entries(), "update rejected: table full");
            return Err(Error::Busy);
        }

        let bucket = raw.bucket(self.hash(key));
        check_update_flags(!bucket.find(key, guard).is_null(), flags)?;

        let block = raw.allocator().alloc().map_err(|e| {
            tracing::trace!("update rejected: element pool exhausted");
            e
        })?;
        let new = Shared::boxed(HashElem::new(block, key, value), &self.collector);

        let lock = bucket.lock.lock();

        // the lookup above ran without the lock; only what we see now is authoritative
        let old = bucket.find(key, guard);
        let admitted = check_update_flags(!old.is_null(), flags).and_then(|()| {
            if old.is_null() && !raw.try_reserve_slot() {
                Err(Error::Busy)
            } else {
                Ok(())
            }
        });
        if let Err(e) = admitted {
            drop(lock);
            // safety: `new` was never published, so nobody else can know about it.
            let elem = Linked::into_inner(*unsafe { new.into_box() });
            if let Some(block) = elem.into_block() {
                raw.allocator().free(block);
            }
            return Err(e);
        }

        // new readers see the new element from here on
        bucket.push_front(new, guard);
        if !old.is_null() {
            bucket.unlink(old, guard);
            // safety: we just unlinked `old` under the bucket lock, and only the holder of
            // that lock can unlink (and thus retire) it.
            unsafe { raw.retire(old, guard) };
        }
        drop(lock);

        Ok(())
    }

    /// Removes `key` from the table.
    ///
    /// Deleting a key that is not present is not an error; the call simply has no effect.
    /// Readers that already hold the deleted value keep seeing it until they drop their guard.
    ///
    /// # Panics
    ///
    /// If `key` has the wrong length, or if `guard` was not obtained from this table.
    pub fn delete(&self, key: &[u8], guard: &Guard<'_>) {
        self.check_guard(guard);
        self.check_key(key);

        let raw = self.raw();
        let bucket = raw.bucket(self.hash(key));
        if bucket.find(key, guard).is_null() {
            return;
        }

        let lock = bucket.lock.lock();
        // someone else may have deleted or replaced it since we looked
        let elem = bucket.find(key, guard);
        if !elem.is_null() {
            bucket.unlink(elem, guard);
            raw.release_slot();
            // safety: we just unlinked `elem` under the bucket lock.
            unsafe { raw.retire(elem, guard) };
        }
        drop(lock);
    }

    /// Returns the key that follows `key` in bucket order, or the first key if `key` is `None`.
    ///
    /// Calling this repeatedly, starting from `None` and feeding each result back in, visits
    /// every key of a table that is not concurrently modified exactly once. Under concurrent
    /// modification keys may be skipped or visited twice. If `key` is no longer in the table,
    /// the walk restarts from the first key.
    ///
    /// # Panics
    ///
    /// If `key` has the wrong length, or if `guard` was not obtained from this table.
    pub fn get_next_key<'g>(
        &'g self,
        key: Option<&[u8]>,
        guard: &'g Guard<'_>,
    ) -> Option<&'g [u8]> {
        self.check_guard(guard);

        let raw = self.raw();
        let count = raw.len();
        if count == 0 || (count == 1 && key.is_some()) {
            return None;
        }

        let mut start = 0;
        if let Some(key) = key {
            self.check_key(key);
            let hash = self.hash(key);
            let elem = raw.bucket(hash).find(key, guard);
            // safety: elements reached under `guard` stay valid for as long as it is held.
            if let Some(elem) = unsafe { elem.as_ref() } {
                let next = elem.next.load(Ordering::Acquire, guard);
                // safety: as above.
                if let Some(next) = unsafe { next.as_ref() } {
                    return Some(next.key());
                }
                start = raw.bucket_index(hash) + 1;
            }
        }

        raw.buckets()[start..].iter().find_map(|bucket| {
            let head = bucket.head.load(Ordering::Acquire, guard);
            // safety: as above.
            unsafe { head.as_ref() }.map(|elem| elem.key())
        })
    }
}

impl<S> Debug for HashTable<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries())
            .field("key_size", &self.key_size())
            .field("value_size", &self.value_size())
            .field("nbuckets", &self.nbuckets())
            .finish()
    }
}

impl<S> Drop for HashTable<S> {
    fn drop(&mut self) {
        let pending = self.pending_releases();
        tracing::debug!(pending, "hashtable teardown requested");

        // safety: this gives up the reference we have held since construction. we never touch
        // the raw table again. elements still waiting for reclamation hold their own references,
        // and they are all released when `self.collector` drops right after this.
        unsafe { RawTable::release(self.raw.as_ptr()) };
    }
}

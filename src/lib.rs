//! A fixed-capacity concurrent hashtable from fixed-size byte keys to fixed-size byte values.
//!
//! `hashtab` is the storage backend of a virtual machine's programmable key/value maps: many
//! execution contexts look keys up while others insert, replace and delete them. Its design
//! follows a few simple rules:
//!
//!  - The table is sized once. Keys and values have fixed sizes, the number of keys is bounded by
//!    `max_entries`, and the number of buckets (the next power of two at or above `max_entries`)
//!    never changes. There is no resizing.
//!  - Readers never block. [`HashTable::lookup`], [`HashTable::get_next_key`] and the iterators
//!    walk a bucket's list without taking any lock.
//!  - Writers lock one bucket. [`HashTable::update`] and [`HashTable::delete`] hold only the lock
//!    of the bucket their key hashes to, and only for as long as it takes to splice its list.
//!  - Memory is bounded. Every element record comes from a pool that is sized when the table is
//!    created (and, by default, filled up front). When the pool runs dry, updates fail with
//!    [`Error::OutOfMemory`] rather than allocating more.
//!
//! # A note on `Guard` and memory use
//!
//! Since a replaced or deleted element may still be read by a concurrent lookup, its memory
//! cannot be reused right away. The table uses epoch-based reclamation (through [`seize`]) to
//! find out when no reader can still see it. Every operation therefore takes a [`Guard`], which
//! you get from [`HashTable::guard`]. References returned by the table are tied to the lifetime of
//! the guard used to obtain them: as long as you hold the guard, the memory behind those
//! references stays valid, even if the key is replaced or deleted in the meantime.
//!
//! Holding a guard also holds back the reuse of every element retired while it is held. Since
//! records come from a bounded pool, long-lived guards in the presence of writers eventually
//! make updates fail with [`Error::OutOfMemory`]. Prefer short-lived guards, or use
//! [`HashTable::pin`], which gives a [`HashTableRef`] with a guard of its own.
//!
//! # Teardown
//!
//! The table's shared state is reference counted: the [`HashTable`] handle holds one reference,
//! and so does every replaced or deleted element whose release is still pending. Dropping the
//! handle (or calling [`HashTable::deinit`]) gives up the handle's reference. Whichever party
//! gives up the last reference frees the buckets and the element pool.
//!
//! # Consistency
//!
//! Once [`HashTable::update`] returns, every subsequent lookup, from any thread, sees the new
//! value. A key being replaced never disappears for a reader, and never appears twice.
//!
//! Ordered iteration ([`HashTable::get_next_key`], [`HashTable::keys`], [`HashTable::iter`]) is
//! weakly consistent: it follows bucket order and list order, and keys inserted or removed while
//! it runs may be missed or seen twice.
//!
//! # Example
//!
//! ```
//! use hashtab::{CreateFlags, Error, HashTable, UpdateFlags};
//!
//! let table = HashTable::new(4, 4, 2, CreateFlags::NONE).unwrap();
//! let t = table.pin();
//!
//! t.update(b"key1", b"val1", UpdateFlags::ANY).unwrap();
//! t.update(b"key1", b"val2", UpdateFlags::ANY).unwrap();
//! assert_eq!(t.lookup(b"key1"), Some(&b"val2"[..]));
//!
//! t.update(b"key2", b"val1", UpdateFlags::NO_EXIST).unwrap();
//! assert_eq!(t.update(b"key3", b"val1", UpdateFlags::ANY), Err(Error::Busy));
//!
//! t.delete(b"key1");
//! assert_eq!(t.get_next_key(None), Some(&b"key2"[..]));
//! assert_eq!(t.get_next_key(Some(&b"key2"[..])), None);
//! ```
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unsafe_op_in_unsafe_fn
)]
#![warn(rustdoc::broken_intra_doc_links)]

mod alloc;
mod error;
mod flags;
mod map;
mod map_ref;
mod node;
mod ops;
mod raw;
mod reclaim;

/// Iterator types.
pub mod iter;

pub use error::Error;
pub use flags::{CreateFlags, UpdateFlags};
pub use map::HashTable;
pub use map_ref::HashTableRef;
pub use ops::{create, MapOps};

/// Default hasher for [`HashTable`].
pub type DefaultHashBuilder = ahash::RandomState;

/// Types needed to safely access shared data concurrently.
pub mod epoch {
    pub use seize::Guard;
}
pub use epoch::Guard;

/// The hasher used by [`HashTable::new`]: [`DefaultHashBuilder`] with all seeds set to zero, so
/// that a key always lands in the same bucket.
pub fn default_hash_builder() -> DefaultHashBuilder {
    DefaultHashBuilder::with_seeds(0, 0, 0, 0)
}

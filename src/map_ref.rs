use crate::iter::*;
use crate::reclaim::{Guard, GuardRef};
use crate::{Error, HashTable, UpdateFlags};
use std::fmt::{self, Debug, Formatter};
use std::hash::BuildHasher;

/// A reference to a [`HashTable`], constructed with [`HashTable::pin`] or [`HashTable::with_guard`].
///
/// The current thread will be pinned for the duration of this reference.
/// Keep in mind that this prevents the reclamation of elements replaced or deleted in the table
/// for as long as the reference is held.
pub struct HashTableRef<'table, S = crate::DefaultHashBuilder> {
    table: &'table HashTable<S>,
    guard: GuardRef<'table>,
}

impl<S> HashTable<S> {
    /// Get a reference to this table with the current thread pinned.
    ///
    /// Keep in mind that for as long as you hold onto this, you are preventing the reclamation of
    /// elements replaced or deleted in this table.
    pub fn pin(&self) -> HashTableRef<'_, S> {
        HashTableRef {
            guard: GuardRef::Owned(self.guard()),
            table: self,
        }
    }

    /// Get a reference to this table with the given guard.
    ///
    /// # Panics
    ///
    /// If `guard` was not obtained from this table.
    pub fn with_guard<'g>(&'g self, guard: &'g Guard<'_>) -> HashTableRef<'g, S> {
        self.check_guard(guard);
        HashTableRef {
            table: self,
            guard: GuardRef::Ref(guard),
        }
    }
}

impl<S> HashTableRef<'_, S> {
    /// Returns the number of keys in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// An iterator visiting all keys in bucket order.
    ///
    /// See also [`HashTable::keys`].
    pub fn keys(&self) -> Keys<'_> {
        self.table.keys(&self.guard)
    }

    /// An iterator visiting all key/value pairs in bucket order.
    ///
    /// See also [`HashTable::iter`].
    pub fn iter(&self) -> Iter<'_> {
        self.table.iter(&self.guard)
    }
}

impl<S> HashTableRef<'_, S>
where
    S: BuildHasher,
{
    /// Returns `true` if the table holds `key`.
    ///
    /// See also [`HashTable::contains_key`].
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.table.contains_key(key, &self.guard)
    }

    /// Returns the value stored for `key`.
    ///
    /// See also [`HashTable::lookup`].
    pub fn lookup<'g>(&'g self, key: &[u8]) -> Option<&'g [u8]> {
        self.table.lookup(key, &self.guard)
    }

    /// Stores `value` for `key`, subject to `flags`.
    ///
    /// See also [`HashTable::update`].
    pub fn update(&self, key: &[u8], value: &[u8], flags: UpdateFlags) -> Result<(), Error> {
        self.table.update(key, value, flags, &self.guard)
    }

    /// Removes `key`, doing nothing if it is absent.
    ///
    /// See also [`HashTable::delete`].
    pub fn delete(&self, key: &[u8]) {
        self.table.delete(key, &self.guard)
    }

    /// Returns the key following `key` in bucket order, or the first key for `None`.
    ///
    /// See also [`HashTable::get_next_key`].
    pub fn get_next_key<'g>(&'g self, key: Option<&[u8]>) -> Option<&'g [u8]> {
        self.table.get_next_key(key, &self.guard)
    }
}

impl<'g, S> IntoIterator for &'g HashTableRef<'_, S> {
    type IntoIter = Iter<'g>;
    type Item = (&'g [u8], &'g [u8]);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S> Debug for HashTableRef<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self).finish()
    }
}

impl<S> Clone for HashTableRef<'_, S> {
    fn clone(&self) -> Self {
        self.table.pin()
    }
}

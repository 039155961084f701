//! The byte-buffer operation contract through which a generic map layer drives a table.
//!
//! [`MapOps`] is object safe, so a dispatcher can hold tables of different map types behind one
//! `Box<dyn MapOps>`. Unlike the typed [`HashTable`] API, every method here copies data in and
//! out of caller-provided buffers, pins its own guard, and reports every failure (including
//! wrongly sized buffers) as an [`Error`] code instead of panicking.

use crate::{CreateFlags, Error, HashTable, UpdateFlags};
use std::hash::BuildHasher;

/// Creates a table behind the dispatch contract, taking the creation flags as raw bits.
///
/// Tearing the map down is dropping the returned box.
///
/// # Errors
///
/// Everything [`HashTable::new`] reports, plus [`Error::InvalidArgument`] for unknown bits in
/// `flags`.
pub fn create(
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    flags: u32,
) -> Result<Box<dyn MapOps>, Error> {
    let flags = CreateFlags::from_bits(flags).ok_or(Error::InvalidArgument)?;
    let map: Box<dyn MapOps> = Box::new(HashTable::new(key_size, value_size, max_entries, flags)?);
    Ok(map)
}

/// Operations a map implementation exposes to the map dispatch layer.
pub trait MapOps: Send + Sync {
    /// Size in bytes of every key.
    fn key_size(&self) -> usize;

    /// Size in bytes of every value.
    fn value_size(&self) -> usize;

    /// Maximum number of keys the map can hold.
    fn max_entries(&self) -> usize;

    /// Copies the value stored for `key` into `value`.
    ///
    /// Fails with [`Error::NotFound`] if `key` is absent.
    fn lookup_elem(&self, key: &[u8], value: &mut [u8]) -> Result<(), Error>;

    /// Stores `value` for `key`. `flags` holds the raw bits of an [`UpdateFlags`].
    fn update_elem(&self, key: &[u8], value: &[u8], flags: u64) -> Result<(), Error>;

    /// Removes `key`. Succeeds whether or not `key` was present.
    fn delete_elem(&self, key: &[u8]) -> Result<(), Error>;

    /// Copies the key following `key` (or the first key, for `None`) into `next_key`.
    ///
    /// Fails with [`Error::NotFound`] once there is no further key.
    fn get_next_key(&self, key: Option<&[u8]>, next_key: &mut [u8]) -> Result<(), Error>;
}

impl<S> HashTable<S> {
    fn check_len(&self, buf: &[u8], expected: usize) -> Result<(), Error> {
        if buf.len() == expected {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }
}

impl<S> MapOps for HashTable<S>
where
    S: BuildHasher + Send + Sync,
{
    fn key_size(&self) -> usize {
        HashTable::key_size(self)
    }

    fn value_size(&self) -> usize {
        HashTable::value_size(self)
    }

    fn max_entries(&self) -> usize {
        HashTable::max_entries(self)
    }

    fn lookup_elem(&self, key: &[u8], value: &mut [u8]) -> Result<(), Error> {
        self.check_len(key, HashTable::key_size(self))?;
        self.check_len(value, HashTable::value_size(self))?;

        let guard = self.guard();
        let found = self.lookup(key, &guard).ok_or(Error::NotFound)?;
        value.copy_from_slice(found);
        Ok(())
    }

    fn update_elem(&self, key: &[u8], value: &[u8], flags: u64) -> Result<(), Error> {
        self.check_len(key, HashTable::key_size(self))?;
        self.check_len(value, HashTable::value_size(self))?;
        let flags = UpdateFlags::from_bits(flags).ok_or(Error::InvalidArgument)?;

        self.update(key, value, flags, &self.guard())
    }

    fn delete_elem(&self, key: &[u8]) -> Result<(), Error> {
        self.check_len(key, HashTable::key_size(self))?;

        self.delete(key, &self.guard());
        Ok(())
    }

    fn get_next_key(&self, key: Option<&[u8]>, next_key: &mut [u8]) -> Result<(), Error> {
        if let Some(key) = key {
            self.check_len(key, HashTable::key_size(self))?;
        }
        self.check_len(next_key, HashTable::key_size(self))?;

        let guard = self.guard();
        let next = HashTable::get_next_key(self, key, &guard).ok_or(Error::NotFound)?;
        next_key.copy_from_slice(next);
        Ok(())
    }
}

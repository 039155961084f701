//! A bounded pool of fixed-size element records.
//!
//! Every record handed out by a [`BlockAllocator`] has the same length. The pool never creates
//! more than `limit` records over its lifetime; once they are all in use, [`BlockAllocator::alloc`]
//! reports [`Error::OutOfMemory`] rather than falling back to the global allocator.

use crate::Error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One fixed-size record.
pub(crate) type Block = Box<[u8]>;

#[derive(Debug)]
pub(crate) struct BlockAllocator {
    block_size: usize,
    limit: usize,
    /// Records created so far. Never exceeds `limit`.
    created: AtomicUsize,
    free: Mutex<Vec<Block>>,
}

impl BlockAllocator {
    pub(crate) fn new(block_size: usize, limit: usize) -> Result<Self, Error> {
        let mut free = Vec::new();
        free.try_reserve_exact(limit).map_err(|_| Error::OutOfMemory)?;
        Ok(Self {
            block_size,
            limit,
            created: AtomicUsize::new(0),
            free: Mutex::new(free),
        })
    }

    /// Creates up to `count` records up front, so that later calls to `alloc` do not allocate.
    pub(crate) fn prealloc(&mut self, count: usize) -> Result<(), Error> {
        let created = self.created.get_mut();
        let count = count.min(self.limit - *created);
        let free = self.free.get_mut();
        for _ in 0..count {
            free.push(new_block(self.block_size)?);
            *created += 1;
        }
        Ok(())
    }

    pub(crate) fn alloc(&self) -> Result<Block, Error> {
        if let Some(block) = self.free.lock().pop() {
            return Ok(block);
        }

        // nothing on the free list; create a record if the limit allows it
        self.created
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .map_err(|_| Error::OutOfMemory)?;
        new_block(self.block_size).map_err(|e| {
            self.created.fetch_sub(1, Ordering::AcqRel);
            e
        })
    }

    pub(crate) fn free(&self, block: Block) {
        debug_assert_eq!(block.len(), self.block_size);
        // room for `limit` records was reserved in `new`, so this push never reallocates
        self.free.lock().push(block);
    }

    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.free.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }
}

fn new_block(size: usize) -> Result<Block, Error> {
    let mut block = Vec::new();
    block.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
    block.resize(size, 0);
    Ok(block.into_boxed_slice())
}

use crate::node::{Bucket, HashElem};
use crate::reclaim::{Guard, Shared};
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::Ordering;

/// Walks every linked element, bucket by bucket, in list order.
pub(crate) struct ElemIter<'g> {
    buckets: &'g [Bucket],

    /// Index of the bucket to enter once the current list runs out
    index: usize,

    /// The element to yield next, or null at the end of a list
    next: Shared<'g, HashElem>,

    guard: &'g Guard<'g>,
}

impl<'g> ElemIter<'g> {
    pub(crate) fn new(buckets: &'g [Bucket], guard: &'g Guard<'g>) -> Self {
        Self {
            buckets,
            index: 0,
            next: Shared::null(),
            guard,
        }
    }
}

impl Debug for ElemIter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElemIter")
            .field("index", &self.index)
            .field("next", &self.next)
            .finish()
    }
}

impl<'g> Iterator for ElemIter<'g> {
    type Item = &'g HashElem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // safety: every element we reach was linked when we loaded it under `self.guard`,
            // so it cannot be reclaimed before that guard is dropped.
            if let Some(elem) = unsafe { self.next.as_ref() } {
                self.next = elem.next.load(Ordering::Acquire, self.guard);
                return Some(&**elem);
            }

            let bucket = self.buckets.get(self.index)?;
            self.index += 1;
            self.next = bucket.head.load(Ordering::Acquire, self.guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CreateFlags, HashTable, UpdateFlags};

    #[test]
    fn iter_empty() {
        let table = HashTable::new(4, 4, 16, CreateFlags::NONE).unwrap();
        let guard = table.guard();
        let mut iter = ElemIter::new(table.raw().buckets(), &guard);
        assert!(iter.next().is_none());
    }

    #[test]
    fn iter_all_buckets() {
        let table = HashTable::new(4, 4, 16, CreateFlags::NONE).unwrap();
        let guard = table.guard();
        for i in 0u32..16 {
            table
                .update(&i.to_ne_bytes(), &i.to_ne_bytes(), UpdateFlags::ANY, &guard)
                .unwrap();
        }

        let mut seen: Vec<_> = ElemIter::new(table.raw().buckets(), &guard)
            .map(|e| e.key().to_vec())
            .collect();
        seen.sort();
        let mut expected: Vec<_> = (0u32..16).map(|i| i.to_ne_bytes().to_vec()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }
}

mod traverser;
pub(crate) use traverser::ElemIter;

use crate::node::Bucket;
use crate::reclaim::Guard;

/// An iterator over a table's key/value pairs.
///
/// See [`HashTable::iter`](crate::HashTable::iter) for details.
#[derive(Debug)]
pub struct Iter<'g> {
    pub(crate) elem_iter: ElemIter<'g>,
}

impl<'g> Iter<'g> {
    pub(crate) fn new(buckets: &'g [Bucket], guard: &'g Guard<'g>) -> Self {
        Self {
            elem_iter: ElemIter::new(buckets, guard),
        }
    }
}

impl<'g> Iterator for Iter<'g> {
    type Item = (&'g [u8], &'g [u8]);
    fn next(&mut self) -> Option<Self::Item> {
        let elem = self.elem_iter.next()?;
        Some((elem.key(), elem.value()))
    }
}

/// An iterator over a table's keys.
///
/// See [`HashTable::keys`](crate::HashTable::keys) for details.
#[derive(Debug)]
pub struct Keys<'g> {
    pub(crate) elem_iter: ElemIter<'g>,
}

impl<'g> Keys<'g> {
    pub(crate) fn new(buckets: &'g [Bucket], guard: &'g Guard<'g>) -> Self {
        Self {
            elem_iter: ElemIter::new(buckets, guard),
        }
    }
}

impl<'g> Iterator for Keys<'g> {
    type Item = &'g [u8];
    fn next(&mut self) -> Option<Self::Item> {
        let elem = self.elem_iter.next()?;
        Some(elem.key())
    }
}

use crate::{
    iterator::CountedIterator,
    util::{Result, Status},
};

/// Owned, removable cursor over a vector
///
/// Yields clones of the elements in order. `remove()` deletes the element
/// returned by the most recent `next()` from the vector; [`into_vec`]
/// returns what is left.
///
/// [`into_vec`]: VecCursor::into_vec
#[derive(Debug, Clone)]
pub struct VecCursor<T> {
    items: Vec<T>,
    index: usize,
    last: Option<usize>,
    count: u64,
}

impl<T: Clone> VecCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        VecCursor {
            items,
            index: 0,
            last: None,
            count: 0,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone> Iterator for VecCursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.items.get(self.index)?.clone();
        self.last = Some(self.index);
        self.index += 1;
        self.count += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.items.len() - self.index;
        (left, Some(left))
    }
}

impl<T: Clone> CountedIterator for VecCursor<T> {
    fn has_next(&mut self) -> bool {
        self.index < self.items.len()
    }

    fn size(&self) -> Option<u64> {
        Some(self.items.len() as u64)
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn remaining(&self) -> Option<u64> {
        Some((self.items.len() - self.index) as u64)
    }

    fn remove(&mut self) -> Result<()> {
        let last = self
            .last
            .take()
            .ok_or_else(|| Status::illegal_state("remove() without a preceding next()"))?;
        self.items.remove(last);
        self.index -= 1;
        Ok(())
    }
}

use crate::{
    iterator::{CountedIterator, Lookahead, size_hint_of},
    util::{Result, Status},
};

/// Counted iterator that can show its next element without consuming it
pub struct CountedPeekingIterator<I: Iterator> {
    inner: I,
    next: Lookahead<I::Item>,
    count: u64,
}

impl<I: CountedIterator> CountedPeekingIterator<I> {
    pub fn new(inner: I) -> Self {
        CountedPeekingIterator {
            inner,
            next: Lookahead::NotFetched,
            count: 0,
        }
    }

    /// The element the next call to `next()` returns, if any
    pub fn peek(&mut self) -> Option<&I::Item> {
        let inner = &mut self.inner;
        self.next.fill_with(|| inner.next());
        self.next.peek()
    }

    /// The element already buffered by an earlier `peek()`/`has_next()`
    pub(crate) fn peeked(&self) -> Option<&I::Item> {
        self.next.peek()
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I: CountedIterator> Iterator for CountedPeekingIterator<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let inner = &mut self.inner;
        self.next.fill_with(|| inner.next());
        let item = self.next.take()?;
        self.count += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        size_hint_of(self, self.next.buffered())
    }
}

impl<I: CountedIterator> CountedIterator for CountedPeekingIterator<I> {
    fn has_next(&mut self) -> bool {
        self.peek().is_some()
    }

    fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    fn total_size(&self) -> Option<u64> {
        self.inner.total_size()
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn remove(&mut self) -> Result<()> {
        if self.next.is_ready() {
            return Err(Status::illegal_state("cannot remove after peek()"));
        }
        self.inner.remove()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::{BasicWrappedIterator, CountedIteratorExt, VecCursor};

    #[test]
    fn test_peek_does_not_consume() {
        let mut iter = BasicWrappedIterator::from_vec(vec![1, 2]).peeking();
        assert_eq!(iter.peek(), Some(&1));
        assert_eq!(iter.peek(), Some(&1));
        assert_eq!(iter.yielded(), 0);
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.peek(), Some(&2));
        assert_eq!(iter.next(), Some(2));
        assert_eq!(iter.peek(), None);
        assert!(!iter.has_next());
        assert_eq!(iter.yielded(), 2);
        assert_eq!(iter.size(), Some(2));
    }

    #[test]
    fn test_remove_after_peek_is_refused() {
        let mut iter = VecCursor::new(vec![1, 2, 3]).peeking();
        iter.next();
        iter.peek();
        assert!(iter.remove().is_err());
    }
}

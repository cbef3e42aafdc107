use std::fmt;

use crate::{
    iterator::{CountedIterator, Lookahead, size_hint_of},
    util::Result,
};

type SizeFn = Box<dyn Fn() -> Option<u64>>;
type Closer = Box<dyn FnOnce() -> Result<()>>;

/// Where a [`BasicWrappedIterator`] gets its sizes from
enum SizeSource {
    Fixed(Option<u64>),
    Supplied(SizeFn),
}

impl SizeSource {
    fn get(&self) -> Option<u64> {
        match self {
            SizeSource::Fixed(size) => *size,
            SizeSource::Supplied(f) => f(),
        }
    }
}

/// Adapts a plain [`Iterator`] into a [`CountedIterator`]
///
/// Plain iterators have no lookahead, so this adapter keeps the single
/// element buffer that makes `has_next()` possible. Sizes are whatever the
/// caller provides: fixed values, suppliers evaluated on every query (for
/// sizes that are only learned while the source is being produced) or the
/// length of an [`ExactSizeIterator`].
///
/// An optional closer runs on the first `close()`, typically to release the
/// cursor the source reads from.
pub struct BasicWrappedIterator<I: Iterator> {
    inner: I,
    next: Lookahead<I::Item>,
    size: SizeSource,
    total_size: SizeSource,
    count: u64,
    closer: Option<Closer>,
}

impl<I: Iterator> BasicWrappedIterator<I> {
    /// Wrap with unknown sizes
    pub fn new(inner: I) -> Self {
        Self::with_sizes(inner, None, None)
    }

    pub fn with_sizes(inner: I, size: Option<u64>, total_size: Option<u64>) -> Self {
        BasicWrappedIterator {
            inner,
            next: Lookahead::NotFetched,
            size: SizeSource::Fixed(size),
            total_size: SizeSource::Fixed(total_size),
            count: 0,
            closer: None,
        }
    }

    /// Sizes are asked from the suppliers every time they are queried
    pub fn with_size_suppliers<S, T>(inner: I, size: S, total_size: T) -> Self
    where
        S: Fn() -> Option<u64> + 'static,
        T: Fn() -> Option<u64> + 'static,
    {
        BasicWrappedIterator {
            inner,
            next: Lookahead::NotFetched,
            size: SizeSource::Supplied(Box::new(size)),
            total_size: SizeSource::Supplied(Box::new(total_size)),
            count: 0,
            closer: None,
        }
    }

    pub fn from_exact(inner: I) -> Self
    where
        I: ExactSizeIterator,
    {
        let len = inner.len() as u64;
        Self::with_sizes(inner, Some(len), Some(len))
    }

    /// Register the action run by the first `close()`
    pub fn with_closer<F>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.closer = Some(Box::new(closer));
        self
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<T> BasicWrappedIterator<std::vec::IntoIter<T>> {
    /// Iterate over a collection; size and total size are its length
    pub fn from_vec(items: Vec<T>) -> Self {
        Self::from_exact(items.into_iter())
    }
}

impl<I: Iterator> Iterator for BasicWrappedIterator<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let inner = &mut self.inner;
        self.next.fill_with(|| inner.next());
        let item = self.next.take()?;
        self.count += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.size.get().is_some() {
            return size_hint_of(self, self.next.buffered());
        }
        if self.next.is_exhausted() {
            return (0, Some(0));
        }
        let (lower, upper) = self.inner.size_hint();
        let buffered = self.next.buffered();
        (
            lower.saturating_add(buffered),
            upper.and_then(|u| u.checked_add(buffered)),
        )
    }
}

impl<I: Iterator> CountedIterator for BasicWrappedIterator<I> {
    fn has_next(&mut self) -> bool {
        let inner = &mut self.inner;
        self.next.fill_with(|| inner.next())
    }

    fn size(&self) -> Option<u64> {
        self.size.get()
    }

    fn total_size(&self) -> Option<u64> {
        self.total_size.get()
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        match self.closer.take() {
            Some(closer) => closer(),
            None => Ok(()),
        }
    }
}

impl<I: Iterator> fmt::Display for BasicWrappedIterator<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size.get() {
            Some(size) => write!(f, "Counted[{}/{}]", self.count, size),
            None => write!(f, "Counted[{}/?]", self.count),
        }
    }
}

/// A counted iterator with no elements
pub fn empty<T>() -> BasicWrappedIterator<std::iter::Empty<T>> {
    BasicWrappedIterator::with_sizes(std::iter::empty(), Some(0), Some(0))
}

/// Decorator that transforms each element of a counted iterator
///
/// The transform runs once per `next()`, never ahead of time. Lookahead,
/// sizes, `remove()` and `close()` are all forwarded to the wrapped
/// iterator, which already buffers.
pub struct WrappedIterator<I, F> {
    inner: I,
    transform: F,
    count: u64,
}

impl<I, F> WrappedIterator<I, F> {
    pub fn new(inner: I, transform: F) -> Self {
        WrappedIterator {
            inner,
            transform,
            count: 0,
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I, T, F> Iterator for WrappedIterator<I, F>
where
    I: CountedIterator,
    F: FnMut(I::Item) -> T,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.inner.next()?;
        self.count += 1;
        Some((self.transform)(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<I, T, F> CountedIterator for WrappedIterator<I, F>
where
    I: CountedIterator,
    F: FnMut(I::Item) -> T,
{
    fn has_next(&mut self) -> bool {
        self.inner.has_next()
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
        self.inner.remove()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

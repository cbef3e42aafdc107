use std::fmt;

use log::error;

use crate::{
    iterator::{CountedIterator, Lookahead, size_hint_of},
    util::{Result, Status},
};

type Counts<T> = Box<dyn Fn(&T) -> bool>;
type Callback = Box<dyn FnOnce()>;
type Closer = Box<dyn FnOnce() -> Result<()>>;

/// Offset and max for another iterator, like SQL `OFFSET`/`LIMIT`
///
/// # Algorithm
///
/// On the first lookahead the first `offset` elements are discarded. After
/// that at most `max` elements are handed out. Both bounds are measured in
/// *counted* elements: by default every element counts, with
/// [`MaxOffsetBuilder::counted_if`] (or `count_nulls(false)` for `Option`
/// items) some elements pass through without using up offset or max.
///
/// # Errors
///
/// For a source of `Result` items, `Err` elements met while discarding the
/// offset are dropped with the rest of the offset. Inside the window an
/// `Err` element is buffered like any other, so `has_next()` reports `true`
/// and the following `next()` returns it.
///
/// # Completion
///
/// Registered callbacks run once, in registration order, when the window
/// turns out to be exhausted. `auto_close()` adds closing of the wrapped
/// iterator after them; it never replaces them.
pub struct MaxOffsetIterator<I: Iterator> {
    inner: I,
    offset: u64,
    max: Option<u64>,
    counts: Option<Counts<I::Item>>,
    /// Counted elements consumed from `inner`, offset included
    consumed: u64,
    next: Lookahead<I::Item>,
    count: u64,
    callbacks: Vec<Callback>,
    auto_close: bool,
    closers: Vec<Closer>,
    completed: bool,
}

impl<I: CountedIterator> MaxOffsetIterator<I> {
    pub fn new(inner: I, offset: u64, max: Option<u64>) -> Self {
        MaxOffsetIterator {
            inner,
            offset,
            max,
            counts: None,
            consumed: 0,
            next: Lookahead::NotFetched,
            count: 0,
            callbacks: Vec::new(),
            auto_close: false,
            closers: Vec::new(),
            completed: false,
        }
    }

    pub fn builder(inner: I) -> MaxOffsetBuilder<I> {
        MaxOffsetBuilder {
            iter: Self::new(inner, 0, None),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The configured max; named apart from [`Iterator::max`]
    pub fn limit(&self) -> Option<u64> {
        self.max
    }

    /// Add a callback to run when the window is exhausted
    pub fn callback<F: FnOnce() + 'static>(mut self, callback: F) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Close the wrapped iterator after the callbacks have run
    pub fn auto_close(mut self) -> Self {
        self.auto_close = true;
        self
    }

    /// Run `closer` after the callbacks (and the wrapped iterator's close)
    pub fn auto_close_with<F>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.closers.push(Box::new(closer));
        self
    }

    /// The element the next call to `next()` returns
    pub fn peek(&mut self) -> Option<&I::Item> {
        self.find_next();
        self.next.peek()
    }

    /// The wrapped iterator, e.g. to look beyond `max`
    ///
    /// Elements taken from it directly are not counted by this iterator.
    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    fn is_counted(&self, item: &I::Item) -> bool {
        self.counts.as_ref().is_none_or(|counts| counts(item))
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            while self.consumed < self.offset {
                let Some(discarded) = self.inner.next() else {
                    break;
                };
                if self.is_counted(&discarded) {
                    self.consumed += 1;
                }
            }

            let limit = self.max.map_or(u64::MAX, |m| m.saturating_add(self.offset));
            let fetched = if self.consumed < limit { self.inner.next() } else { None };
            match fetched {
                Some(item) => {
                    if self.is_counted(&item) {
                        self.consumed += 1;
                    }
                    self.next = Lookahead::Ready(item);
                },
                None => {
                    self.next = Lookahead::Exhausted;
                    self.complete();
                },
            }
        }
        self.next.is_ready()
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        for callback in self.callbacks.drain(..) {
            callback();
        }
        if self.auto_close {
            if let Err(e) = self.inner.close() {
                error!("auto-closing {} failed: {e}", std::any::type_name::<I>());
            }
        }
        for closer in self.closers.drain(..) {
            if let Err(e) = closer() {
                error!("auto-close failed: {e}");
            }
        }
    }
}

impl<I: CountedIterator> Iterator for MaxOffsetIterator<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        self.find_next();
        let item = self.next.take()?;
        self.count += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        size_hint_of(self, self.next.buffered())
    }
}

impl<I: CountedIterator> CountedIterator for MaxOffsetIterator<I> {
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    fn size(&self) -> Option<u64> {
        let after_offset = self.inner.size()?.saturating_sub(self.offset);
        Some(self.max.map_or(after_offset, |max| after_offset.min(max)))
    }

    fn total_size(&self) -> Option<u64> {
        self.inner.total_size()
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn remove(&mut self) -> Result<()> {
        if self.next.is_ready() {
            return Err(Status::illegal_state("cannot remove after lookahead"));
        }
        self.inner.remove()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl<I: Iterator + fmt::Display> fmt::Display for MaxOffsetIterator<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}[{},{}]", self.inner, self.offset, max),
            None => write!(f, "{}[{},]", self.inner, self.offset),
        }
    }
}

/// Builder for [`MaxOffsetIterator`]
pub struct MaxOffsetBuilder<I: Iterator> {
    iter: MaxOffsetIterator<I>,
}

impl<I: CountedIterator> MaxOffsetBuilder<I> {
    /// Number of counted elements to discard, default 0
    pub fn offset(mut self, offset: u64) -> Self {
        self.iter.offset = offset;
        self
    }

    /// Number of counted elements to hand out, default unbounded
    pub fn max(mut self, max: u64) -> Self {
        self.iter.max = Some(max);
        self
    }

    /// Only elements accepted by `counts` use up offset and max
    pub fn counted_if<F>(mut self, counts: F) -> Self
    where
        F: Fn(&I::Item) -> bool + 'static,
    {
        self.iter.counts = Some(Box::new(counts));
        self
    }

    pub fn callback<F: FnOnce() + 'static>(mut self, callback: F) -> Self {
        self.iter = self.iter.callback(callback);
        self
    }

    pub fn auto_close(mut self) -> Self {
        self.iter = self.iter.auto_close();
        self
    }

    pub fn build(self) -> MaxOffsetIterator<I> {
        self.iter
    }
}

impl<U: 'static, I: CountedIterator<Item = Option<U>>> MaxOffsetBuilder<I> {
    /// Whether `None` elements use up offset and max, default `true`
    pub fn count_nulls(mut self, count_nulls: bool) -> Self {
        self.iter.counts = if count_nulls {
            None
        } else {
            Some(Box::new(Option::is_some))
        };
        self
    }
}

use std::fmt;

use crate::{
    iterator::{CountedIterator, Lookahead},
    util::{Result, Status},
};

/// Threshold used by [`KeepAlive::new`]
pub const DEFAULT_KEEP_ALIVE_COUNT: u64 = 100;

/// Periodic progress report for long filtered scans
///
/// Every `count` *examined* elements the callback receives the number of
/// elements that passed the filter since the previous report. A breaking
/// keep-alive may return `true` to stop the iteration.
pub struct KeepAlive {
    count: u64,
    callback: Box<dyn FnMut(u64) -> bool>,
}

impl KeepAlive {
    /// Report every [`DEFAULT_KEEP_ALIVE_COUNT`] examined elements
    pub fn new<F: FnMut(u64) + 'static>(callback: F) -> Self {
        Self::of(DEFAULT_KEEP_ALIVE_COUNT, callback)
    }

    /// Report every `count` examined elements
    pub fn of<F: FnMut(u64) + 'static>(count: u64, mut callback: F) -> Self {
        KeepAlive {
            count,
            callback: Box::new(move |accepted| {
                callback(accepted);
                false
            }),
        }
    }

    /// Like [`KeepAlive::of`], but the callback returns whether to stop
    pub fn breaking<F: FnMut(u64) -> bool + 'static>(count: u64, callback: F) -> Self {
        KeepAlive {
            count,
            callback: Box::new(callback),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAlive").field("count", &self.count).finish()
    }
}

/// Skips the elements a predicate rejects
///
/// # Keep-alive
///
/// Both the examined and the accepted elements are counted. When the
/// examined count reaches the keep-alive threshold the callback receives the
/// accepted count and both counters restart at zero. This happens inside the
/// scan, so a stream where nothing matches still reports progress.
///
/// # Removal
///
/// `remove()` forwards to the wrapped iterator and therefore only works
/// right after `next()`: once `has_next()` has scanned past rejected
/// elements the wrapped iterator is no longer positioned on the returned one
/// and the call is refused.
pub struct FilteringIterator<I: Iterator, P> {
    inner: I,
    predicate: P,
    keep_alive: Option<KeepAlive>,
    next: Lookahead<I::Item>,
    examined: u64,
    accepted: u64,
    count: u64,
    removable: bool,
}

impl<I, P> FilteringIterator<I, P>
where
    I: CountedIterator,
    P: FnMut(&I::Item) -> bool,
{
    pub fn new(inner: I, predicate: P) -> Self {
        FilteringIterator {
            inner,
            predicate,
            keep_alive: None,
            next: Lookahead::NotFetched,
            examined: 0,
            accepted: 0,
            count: 0,
            removable: false,
        }
    }

    pub fn with_keep_alive(inner: I, predicate: P, keep_alive: KeepAlive) -> Self {
        let mut iter = Self::new(inner, predicate);
        iter.keep_alive = Some(keep_alive);
        iter
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            self.removable = false;
            self.next = self.scan();
        }
        self.next.is_ready()
    }

    fn scan(&mut self) -> Lookahead<I::Item> {
        while let Some(item) = self.inner.next() {
            self.examined += 1;
            let accepted = (self.predicate)(&item);
            if accepted {
                self.accepted += 1;
            }
            if let Some(keep_alive) = self.keep_alive.as_mut() {
                if self.examined >= keep_alive.count {
                    let stop = (keep_alive.callback)(self.accepted);
                    self.examined = 0;
                    self.accepted = 0;
                    if stop {
                        return Lookahead::Exhausted;
                    }
                }
            }
            if accepted {
                return Lookahead::Ready(item);
            }
        }
        Lookahead::Exhausted
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I> FilteringIterator<I, fn(&I::Item) -> bool>
where
    I: CountedIterator,
{
    /// Accept everything, only reporting progress
    pub fn keep_alive_only(inner: I, keep_alive: KeepAlive) -> Self {
        fn accept_all<T>(_: &T) -> bool {
            true
        }
        Self::with_keep_alive(inner, accept_all::<I::Item>, keep_alive)
    }
}

impl<I, P> Iterator for FilteringIterator<I, P>
where
    I: CountedIterator,
    P: FnMut(&I::Item) -> bool,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        self.find_next();
        let item = self.next.take()?;
        self.count += 1;
        self.removable = true;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (_, upper) = self.inner.size_hint();
        let buffered = self.next.buffered();
        (buffered, upper.and_then(|u| u.checked_add(buffered)))
    }
}

impl<I, P> CountedIterator for FilteringIterator<I, P>
where
    I: CountedIterator,
    P: FnMut(&I::Item) -> bool,
{
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    /// Unknown: the filter decides how many elements survive
    fn size(&self) -> Option<u64> {
        None
    }

    fn total_size(&self) -> Option<u64> {
        self.inner.total_size()
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn remove(&mut self) -> Result<()> {
        if !self.removable {
            return Err(Status::illegal_state(
                "remove() must directly follow next() on a filtering iterator",
            ));
        }
        self.removable = false;
        self.inner.remove()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

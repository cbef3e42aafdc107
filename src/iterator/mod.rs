//! Counted iterator module
//!
//! Provides a family of lazy pull iterators that share one contract,
//! [`CountedIterator`], and compose into pipelines:
//!
//! ```text
//! source (Vec, cursor, batched API, JSON stream)
//!     ↓
//! BasicWrappedIterator / VecCursor / BatchedReceiver / JsonArrayIterator
//!     ↓
//! FilteringIterator → MaxOffsetIterator → HeadAdder / TailAdder
//!     ↓
//! MergedSortedIterator (optionally combining sibling pipelines)
//! ```
//!
//! ## Key Design Principles
//!
//! 1. **Lazy Evaluation**: nothing is pulled from a source before `has_next()`
//!    or `next()` asks for it
//! 2. **Single Lookahead**: at most one element is buffered per decorator
//! 3. **Idempotent `has_next`**: asking twice without `next()` in between has
//!    no further effect
//! 4. **Owned Composition**: each decorator owns (moves) exactly one upstream
//!    iterator; nothing is shared between instances
//!
//! ## Errors
//!
//! Fallible sources are iterators over `Result<T, E>`. An `Err` item is an
//! element like any other: decorators neither swallow it (except in the
//! offset phase of [`MaxOffsetIterator`]) nor treat it as exhaustion.

use crate::util::{Result, Status};

/// Pull iterator that knows how many elements it has yielded and, when
/// possible, how many it holds.
///
/// # Sizes
///
/// - `size()` is the number of elements in this iterator's own window, if
///   known. `None` means unknown, possibly infinite.
/// - `total_size()` is the size of the logical collection this iterator is a
///   window into. Unless a component changes windowing it equals `size()`.
/// - `remaining()` is `size() - yielded()`.
///
/// # Exhaustion
///
/// `next()` returning `None` is the exhaustion signal. All implementations
/// are fused: once exhausted, `has_next()` keeps returning `false`.
pub trait CountedIterator: Iterator {
    /// Whether a following `next()` will return an element
    ///
    /// May pull one element from upstream. Calling it repeatedly without
    /// `next()` in between has no further side effects.
    fn has_next(&mut self) -> bool;

    /// Number of elements in this iterator's window, if known
    fn size(&self) -> Option<u64> {
        None
    }

    /// Number of elements in the un-windowed collection, if known
    fn total_size(&self) -> Option<u64> {
        self.size()
    }

    /// Number of elements yielded so far
    fn yielded(&self) -> u64;

    /// Number of elements still to come, if known
    fn remaining(&self) -> Option<u64> {
        self.size().map(|s| s.saturating_sub(self.yielded()))
    }

    /// Remove the most recently yielded element from the underlying source
    fn remove(&mut self) -> Result<()> {
        Err(Status::not_supported("remove"))
    }

    /// Release resources held by the source
    ///
    /// Safe to call more than once and after exhaustion.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<I: CountedIterator + ?Sized> CountedIterator for Box<I> {
    fn has_next(&mut self) -> bool {
        (**self).has_next()
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }

    fn total_size(&self) -> Option<u64> {
        (**self).total_size()
    }

    fn yielded(&self) -> u64 {
        (**self).yielded()
    }

    fn remaining(&self) -> Option<u64> {
        (**self).remaining()
    }

    fn remove(&mut self) -> Result<()> {
        (**self).remove()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// One element lookahead buffer
#[derive(Debug)]
pub(crate) enum Lookahead<T> {
    NotFetched,
    Ready(T),
    Exhausted,
}

impl<T> Lookahead<T> {
    /// Fill the buffer with `fetch` unless it is already resolved
    ///
    /// Returns whether an element is ready.
    pub(crate) fn fill_with(&mut self, fetch: impl FnOnce() -> Option<T>) -> bool {
        if let Lookahead::NotFetched = self {
            *self = match fetch() {
                Some(item) => Lookahead::Ready(item),
                None => Lookahead::Exhausted,
            };
        }
        self.is_ready()
    }

    /// Take the buffered element, leaving the buffer unresolved
    ///
    /// An exhausted buffer stays exhausted.
    pub(crate) fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Lookahead::NotFetched) {
            Lookahead::Ready(item) => Some(item),
            Lookahead::NotFetched => None,
            Lookahead::Exhausted => {
                *self = Lookahead::Exhausted;
                None
            },
        }
    }

    pub(crate) fn peek(&self) -> Option<&T> {
        match self {
            Lookahead::Ready(item) => Some(item),
            _ => None,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, Lookahead::Ready(_))
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        matches!(self, Lookahead::Exhausted)
    }

    pub(crate) fn buffered(&self) -> usize {
        usize::from(self.is_ready())
    }
}

/// `size_hint` derived from a counted iterator's `remaining()`
pub(crate) fn size_hint_of<I: CountedIterator + ?Sized>(iter: &I, buffered: usize) -> (usize, Option<usize>) {
    match iter.remaining() {
        Some(r) => {
            let r = usize::try_from(r).unwrap_or(usize::MAX);
            (r.max(buffered), Some(r.max(buffered)))
        },
        None => (buffered, None),
    }
}

/// Fluent constructors for the decorators of this module
pub trait CountedIteratorExt: CountedIterator + Sized {
    /// Run `callback` once, as soon as this iterator turns out to be exhausted
    fn on_exhausted<F: FnOnce()>(self, callback: F) -> CallbackIterator<Self, F> {
        CallbackIterator::new(self, callback)
    }

    /// Keep only the elements accepted by `predicate`
    fn filtered<P>(self, predicate: P) -> FilteringIterator<Self, P>
    where
        P: FnMut(&Self::Item) -> bool,
    {
        FilteringIterator::new(self, predicate)
    }

    /// Keep only the elements accepted by `predicate`, reporting progress
    /// through `keep_alive`
    fn filtered_with_keep_alive<P>(self, predicate: P, keep_alive: KeepAlive) -> FilteringIterator<Self, P>
    where
        P: FnMut(&Self::Item) -> bool,
    {
        FilteringIterator::with_keep_alive(self, predicate, keep_alive)
    }

    /// Start building an offset/max window over this iterator
    fn max_offset(self) -> MaxOffsetBuilder<Self> {
        MaxOffsetIterator::builder(self)
    }

    /// Transform every element lazily with `transform`
    fn map_counted<T, F>(self, transform: F) -> WrappedIterator<Self, F>
    where
        F: FnMut(Self::Item) -> T,
    {
        WrappedIterator::new(self, transform)
    }

    fn peeking(self) -> CountedPeekingIterator<Self> {
        CountedPeekingIterator::new(self)
    }

    fn boxed<'a>(self) -> Box<dyn CountedIterator<Item = Self::Item> + 'a>
    where
        Self: 'a,
    {
        Box::new(self)
    }
}

impl<I: CountedIterator> CountedIteratorExt for I {}

/// Adapt any iterator into a [`BasicWrappedIterator`]
pub trait IntoCounted: Iterator + Sized {
    /// Wrap with unknown size
    fn counted(self) -> BasicWrappedIterator<Self> {
        BasicWrappedIterator::new(self)
    }

    /// Wrap with a known size; the total size is the same
    fn counted_with_size(self, size: u64) -> BasicWrappedIterator<Self> {
        BasicWrappedIterator::with_sizes(self, Some(size), Some(size))
    }

    /// Wrap, taking the size from [`ExactSizeIterator::len`]
    fn counted_exact(self) -> BasicWrappedIterator<Self>
    where
        Self: ExactSizeIterator,
    {
        BasicWrappedIterator::from_exact(self)
    }
}

impl<I: Iterator> IntoCounted for I {}

mod adder;
mod batched;
mod callback;
mod cursor;
mod filtering;
mod max_offset;
mod merged_sorted;
mod peeking;
mod wrapped;

pub use adder::{AddPolicy, Adder, HeadAdder, HeadAdderBuilder, TailAdder, TailAdderBuilder};
pub use batched::{BatchedReceiver, BatchedReceiverBuilder, DEFAULT_BATCH_SIZE, resumable};
pub use callback::CallbackIterator;
pub use cursor::VecCursor;
pub use filtering::{DEFAULT_KEEP_ALIVE_COUNT, FilteringIterator, KeepAlive};
pub use max_offset::{MaxOffsetBuilder, MaxOffsetIterator};
pub use merged_sorted::{MergeStrategy, MergedSortedIterator};
pub use peeking::CountedPeekingIterator;
pub use wrapped::{BasicWrappedIterator, WrappedIterator, empty};

use std::cmp::Ordering;

use log::warn;

use crate::{
    iterator::{CountedIterator, CountedPeekingIterator, Lookahead, size_hint_of},
    util::Result,
};

/// How a [`MergedSortedIterator`] picks the next source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Sources are kept in a binary heap ordered by their head element.
    ///
    /// Every source is primed on the first access and a source is refilled
    /// right after it supplied an element. O(log k) per step.
    #[default]
    Queue,
    /// Every step scans the head of each source and advances only the
    /// winner, and only when `has_next()`/`next()` asks for an element.
    ///
    /// O(k) comparisons per step. Use it when a source wraps a resource that
    /// must only be touched in strict response to the caller's pulls, such as
    /// a database session cursor.
    SameThread,
}

/// K-way merge of sorted counted iterators
///
/// Yields the elements of all sources in non-decreasing order according to
/// `compare`. Each source must itself be sorted; that is not checked. When
/// heads compare equal the source declared first wins, so the merge is
/// stable with respect to source order.
///
/// ```text
/// MergedSortedIterator
///     ├─→ Vec<CountedPeekingIterator<I>> (one lookahead per source)
///     ├─→ Vec<usize> (queue strategy: min-heap of source indices, by head then index)
///     └─→ Lookahead (the element the next `next()` returns)
/// ```
pub struct MergedSortedIterator<I: Iterator, C> {
    sources: Vec<CountedPeekingIterator<I>>,
    compare: C,
    strategy: MergeStrategy,
    heap: Vec<usize>,
    primed: bool,
    next: Lookahead<I::Item>,
    count: u64,
}

impl<I, C> MergedSortedIterator<I, C>
where
    I: CountedIterator,
    C: FnMut(&I::Item, &I::Item) -> Ordering,
{
    pub fn new(sources: Vec<I>, compare: C, strategy: MergeStrategy) -> Self {
        MergedSortedIterator {
            sources: sources.into_iter().map(CountedPeekingIterator::new).collect(),
            compare,
            strategy,
            heap: Vec::new(),
            primed: false,
            next: Lookahead::NotFetched,
            count: 0,
        }
    }

    /// Merge through a priority queue of sources
    pub fn queue(sources: Vec<I>, compare: C) -> Self {
        Self::new(sources, compare, MergeStrategy::Queue)
    }

    /// Merge by scanning every source's head on each step
    pub fn same_thread(sources: Vec<I>, compare: C) -> Self {
        Self::new(sources, compare, MergeStrategy::SameThread)
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            let item = match self.strategy {
                MergeStrategy::Queue => self.fetch_queued(),
                MergeStrategy::SameThread => self.fetch_scanned(),
            };
            self.next = match item {
                Some(item) => Lookahead::Ready(item),
                None => Lookahead::Exhausted,
            };
        }
        self.next.is_ready()
    }

    fn fetch_queued(&mut self) -> Option<I::Item> {
        let Self {
            sources,
            compare,
            heap,
            primed,
            ..
        } = self;
        if !*primed {
            *primed = true;
            for index in 0..sources.len() {
                if sources[index].has_next() {
                    heap_push(heap, index, sources, compare);
                }
            }
        }
        let index = heap_pop(heap, sources, compare)?;
        let item = sources[index].next();
        if sources[index].has_next() {
            heap_push(heap, index, sources, compare);
        }
        item
    }

    fn fetch_scanned(&mut self) -> Option<I::Item> {
        let Self { sources, compare, .. } = self;
        let mut winner: Option<(usize, &I::Item)> = None;
        for source in sources.iter_mut() {
            source.has_next();
        }
        for (index, source) in sources.iter().enumerate() {
            let Some(head) = source.peeked() else {
                continue;
            };
            // replace only when strictly greater: earlier sources win ties
            winner = match winner {
                Some((w, best)) if compare(best, head) != Ordering::Greater => Some((w, best)),
                _ => Some((index, head)),
            };
        }
        let (index, _) = winner?;
        sources[index].next()
    }
}

/// Whether source `a` comes out before source `b`: smaller head first, then
/// lower index
fn heap_before<I, C>(sources: &[CountedPeekingIterator<I>], compare: &mut C, a: usize, b: usize) -> bool
where
    I: CountedIterator,
    C: FnMut(&I::Item, &I::Item) -> Ordering,
{
    match (sources[a].peeked(), sources[b].peeked()) {
        (Some(x), Some(y)) => compare(x, y).then(a.cmp(&b)) == Ordering::Less,
        _ => a < b,
    }
}

/// Add source `index`, which must have a head element
fn heap_push<I, C>(heap: &mut Vec<usize>, index: usize, sources: &[CountedPeekingIterator<I>], compare: &mut C)
where
    I: CountedIterator,
    C: FnMut(&I::Item, &I::Item) -> Ordering,
{
    heap.push(index);
    let mut pos = heap.len() - 1;
    while pos > 0 {
        let parent = (pos - 1) / 2;
        if !heap_before(sources, compare, heap[pos], heap[parent]) {
            break;
        }
        heap.swap(pos, parent);
        pos = parent;
    }
}

/// Remove the source with the smallest head
fn heap_pop<I, C>(heap: &mut Vec<usize>, sources: &[CountedPeekingIterator<I>], compare: &mut C) -> Option<usize>
where
    I: CountedIterator,
    C: FnMut(&I::Item, &I::Item) -> Ordering,
{
    if heap.is_empty() {
        return None;
    }
    let top = heap.swap_remove(0);
    let mut pos = 0;
    loop {
        let (left, right) = (2 * pos + 1, 2 * pos + 2);
        let mut smallest = pos;
        if left < heap.len() && heap_before(sources, compare, heap[left], heap[smallest]) {
            smallest = left;
        }
        if right < heap.len() && heap_before(sources, compare, heap[right], heap[smallest]) {
            smallest = right;
        }
        if smallest == pos {
            return Some(top);
        }
        heap.swap(pos, smallest);
        pos = smallest;
    }
}

impl<I, T> MergedSortedIterator<I, fn(&T, &T) -> Ordering>
where
    I: CountedIterator<Item = T>,
    T: Ord,
{
    /// Merge by the natural order of the elements
    pub fn natural(sources: Vec<I>, strategy: MergeStrategy) -> Self {
        Self::new(sources, T::cmp, strategy)
    }
}

impl<I, C> Iterator for MergedSortedIterator<I, C>
where
    I: CountedIterator,
    C: FnMut(&I::Item, &I::Item) -> Ordering,
{
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

impl<I, C> CountedIterator for MergedSortedIterator<I, C>
where
    I: CountedIterator,
    C: FnMut(&I::Item, &I::Item) -> Ordering,
{
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    /// Sum of the source sizes, known only if every source size is known
    fn size(&self) -> Option<u64> {
        self.sources.iter().map(|s| s.size()).sum()
    }

    fn total_size(&self) -> Option<u64> {
        self.sources.iter().map(|s| s.total_size()).sum()
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    /// Close every source, returning the first failure
    fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for (index, source) in self.sources.iter_mut().enumerate() {
            if let Err(e) = source.close() {
                warn!("failed to close merge source {index}: {e}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

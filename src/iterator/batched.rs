use log::debug;

use crate::iterator::{CountedIterator, Lookahead};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Iterates all elements of a source that only hands them out in batches
///
/// The source is a batch getter called with the offset of the next batch and
/// the batch size. The first batch is requested at the start offset. Once a
/// batch is drained the offset moves past it; a full batch (at least
/// `batch_size` elements) means more may follow, so the next batch is
/// requested, anything shorter ends the iteration. A getter returning `None`
/// ends it as well.
///
/// Nothing is requested before the first `has_next()` or `next()`.
///
/// ```
/// use counted_iter::iterator::BatchedReceiver;
///
/// let rows: Vec<u32> = (0..25).collect();
/// let all: Vec<u32> = BatchedReceiver::builder(|offset: u64, max: usize| {
///     Some(rows.iter().copied().skip(offset as usize).take(max).collect::<Vec<_>>())
/// })
/// .batch_size(10)
/// .build()
/// .collect();
/// assert_eq!(all, rows);
/// ```
pub struct BatchedReceiver<B: IntoIterator, F> {
    getter: F,
    batch_size: usize,
    offset: u64,
    batch: Option<B::IntoIter>,
    in_batch: usize,
    batches: u64,
    next: Lookahead<B::Item>,
    count: u64,
}

impl<B, F> BatchedReceiver<B, F>
where
    B: IntoIterator,
    F: FnMut(u64, usize) -> Option<B>,
{
    pub fn new(getter: F, batch_size: usize, offset: u64) -> Self {
        BatchedReceiver {
            getter,
            batch_size: batch_size.max(1),
            offset,
            batch: None,
            in_batch: 0,
            batches: 0,
            next: Lookahead::NotFetched,
            count: 0,
        }
    }

    pub fn builder(getter: F) -> BatchedReceiverBuilder<F> {
        BatchedReceiverBuilder {
            getter,
            batch_size: DEFAULT_BATCH_SIZE,
            offset: 0,
        }
    }

    /// Offset of the batch currently being drained
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of times the batch getter has been called
    pub fn batches_fetched(&self) -> u64 {
        self.batches
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            let item = self.fetch();
            self.next.fill_with(|| item);
        }
        self.next.is_ready()
    }

    fn fetch(&mut self) -> Option<B::Item> {
        loop {
            if let Some(batch) = &mut self.batch {
                if let Some(item) = batch.next() {
                    self.in_batch += 1;
                    return Some(item);
                }
                self.batch = None;
                self.offset += self.in_batch as u64;
                if self.in_batch < self.batch_size {
                    debug!("batch of {} at offset {} was the last one", self.in_batch, self.offset);
                    return None;
                }
            }
            self.batches += 1;
            self.in_batch = 0;
            debug!("fetching batch {} at offset {}", self.batches, self.offset);
            self.batch = Some((self.getter)(self.offset, self.batch_size)?.into_iter());
        }
    }
}

impl<B, F> Iterator for BatchedReceiver<B, F>
where
    B: IntoIterator,
    F: FnMut(u64, usize) -> Option<B>,
{
    type Item = B::Item;

    fn next(&mut self) -> Option<B::Item> {
        if !self.find_next() {
            return None;
        }
        let item = self.next.take()?;
        self.count += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.next.buffered(), None)
    }
}

impl<B, F> CountedIterator for BatchedReceiver<B, F>
where
    B: IntoIterator,
    F: FnMut(u64, usize) -> Option<B>,
{
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    fn yielded(&self) -> u64 {
        self.count
    }
}

pub struct BatchedReceiverBuilder<F> {
    getter: F,
    batch_size: usize,
    offset: u64,
}

impl<F> BatchedReceiverBuilder<F> {
    /// Elements per batch; a batch shorter than this is the last one
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Offset of the first batch
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn build<B>(self) -> BatchedReceiver<B, F>
    where
        B: IntoIterator,
        F: FnMut(u64, usize) -> Option<B>,
    {
        BatchedReceiver::new(self.getter, self.batch_size, self.offset)
    }
}

/// Builder for a source that keeps its own position, like an API handing
/// out resumption tokens
///
/// `supplier` is called for every batch; offset and batch size are not
/// passed to it. A batch shorter than the batch size still ends the
/// iteration.
pub fn resumable<B, S>(mut supplier: S) -> BatchedReceiverBuilder<impl FnMut(u64, usize) -> Option<B>>
where
    S: FnMut() -> Option<B>,
{
    BatchedReceiverBuilder {
        getter: move |_: u64, _: usize| supplier(),
        batch_size: DEFAULT_BATCH_SIZE,
        offset: 0,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::iterator::CountedIteratorExt;

    fn rows(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    /// Getter over `rows` that records the offset of every call
    fn paged(rows: &[u32], calls: &RefCell<Vec<u64>>) -> impl FnMut(u64, usize) -> Option<Vec<u32>> {
        move |offset, max| {
            calls.borrow_mut().push(offset);
            Some(rows.iter().copied().skip(offset as usize).take(max).collect())
        }
    }

    #[test]
    fn test_batch_boundaries() {
        let data = rows(25);
        let calls = RefCell::new(Vec::new());
        let mut iter = BatchedReceiver::builder(paged(&data, &calls)).batch_size(10).build();
        let all: Vec<u32> = iter.by_ref().collect();
        assert_eq!(all, data);
        assert_eq!(*calls.borrow(), vec![0, 10, 20]);
        assert_eq!(iter.yielded(), 25);
        assert_eq!(iter.offset(), 25);
        assert_eq!(iter.batches_fetched(), 3);
        assert_eq!(iter.size(), None);
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_batch() {
        let data = rows(20);
        let calls = RefCell::new(Vec::new());
        let iter = BatchedReceiver::builder(paged(&data, &calls)).batch_size(10).build();
        assert_eq!(iter.count(), 20);
        // the second batch is full, so one more (empty) batch is asked for
        assert_eq!(*calls.borrow(), vec![0, 10, 20]);
    }

    #[test]
    fn test_empty_first_batch() {
        let calls = RefCell::new(Vec::new());
        let mut iter = BatchedReceiver::builder(paged(&[], &calls)).build();
        assert!(!iter.has_next());
        assert!(!iter.has_next());
        assert_eq!(iter.next(), None);
        assert_eq!(*calls.borrow(), vec![0]);
        assert_eq!(iter.yielded(), 0);
    }

    #[test]
    fn test_getter_without_batch_ends_iteration() {
        let mut calls = 0;
        let mut iter = BatchedReceiver::builder(|offset: u64, _: usize| {
            calls += 1;
            (offset == 0).then(|| vec!["a", "b"])
        })
        .batch_size(2)
        .build();
        assert_eq!(iter.by_ref().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(!iter.has_next());
        drop(iter);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_start_offset() {
        let data = rows(23);
        let calls = RefCell::new(Vec::new());
        let iter = BatchedReceiver::builder(paged(&data, &calls)).batch_size(6).offset(10).build();
        assert_eq!(iter.collect::<Vec<_>>(), data[10..].to_vec());
        assert_eq!(*calls.borrow(), vec![10, 16, 22]);
    }

    #[test]
    fn test_lazy_until_asked() {
        let data = rows(5);
        let calls = RefCell::new(Vec::new());
        let mut iter = BatchedReceiver::builder(paged(&data, &calls)).batch_size(2).build();
        assert!(calls.borrow().is_empty());
        assert!(iter.has_next());
        assert!(iter.has_next());
        assert_eq!(*calls.borrow(), vec![0]);
        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next(), Some(1));
        assert_eq!(*calls.borrow(), vec![0]);
        assert_eq!(iter.next(), Some(2));
        assert_eq!(*calls.borrow(), vec![0, 2]);
    }

    #[test]
    fn test_zero_batch_size_is_one() {
        let data = rows(3);
        let calls = RefCell::new(Vec::new());
        let iter = BatchedReceiver::builder(paged(&data, &calls)).batch_size(0).build();
        assert_eq!(iter.batch_size(), 1);
        assert_eq!(iter.count(), 3);
        assert_eq!(*calls.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_resumable_supplier() {
        let mut pages = vec![vec!["e", "f"], vec!["c", "d"], vec!["a", "b"]];
        let iter = resumable(|| pages.pop()).batch_size(2).build();
        assert_eq!(iter.collect::<Vec<_>>(), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_resumable_short_batch_is_last() {
        let mut served = 0;
        let iter = resumable(|| {
            served += 1;
            Some(vec![served; 3])
        })
        .batch_size(4)
        .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec![1, 1, 1]);
        assert_eq!(served, 1);
    }

    #[test]
    fn test_window_stops_fetching() {
        let data = rows(100);
        let calls = RefCell::new(Vec::new());
        let page: Vec<u32> = BatchedReceiver::builder(paged(&data, &calls))
            .batch_size(10)
            .build()
            .max_offset()
            .offset(5)
            .max(10)
            .build()
            .collect();
        assert_eq!(page, (5..15).collect::<Vec<_>>());
        assert_eq!(*calls.borrow(), vec![0, 10]);
    }
}

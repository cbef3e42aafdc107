use crate::{
    iterator::{CountedIterator, Lookahead},
    util::Result,
};

/// Runs a callback once the wrapped iterator turns out to be exhausted
///
/// After each `next()` the wrapped iterator is asked whether more elements
/// follow, so the callback fires as soon as the last real element has been
/// handed out rather than on some later, unrelated call.
///
/// An `Err` item from the wrapped iterator is an element: it is passed on
/// and does not fire the callback.
pub struct CallbackIterator<I, F> {
    inner: I,
    callback: Option<F>,
    state: Lookahead<()>,
    count: u64,
}

impl<I, F> CallbackIterator<I, F>
where
    I: CountedIterator,
    F: FnOnce(),
{
    pub fn new(inner: I, callback: F) -> Self {
        CallbackIterator {
            inner,
            callback: Some(callback),
            state: Lookahead::NotFetched,
            count: 0,
        }
    }

    fn find_next(&mut self) -> bool {
        let inner = &mut self.inner;
        let more = self.state.fill_with(|| inner.has_next().then_some(()));
        if !more {
            self.fire();
        }
        more
    }

    fn fire(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }

    /// Whether the callback has already run
    pub fn callback_fired(&self) -> bool {
        self.callback.is_none()
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I, F> Iterator for CallbackIterator<I, F>
where
    I: CountedIterator,
    F: FnOnce(),
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if !self.find_next() {
            return None;
        }
        self.state.take();
        let item = match self.inner.next() {
            Some(item) => item,
            None => {
                self.state = Lookahead::Exhausted;
                self.fire();
                return None;
            },
        };
        self.count += 1;
        self.find_next();
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<I, F> CountedIterator for CallbackIterator<I, F>
where
    I: CountedIterator,
    F: FnOnce(),
{
    fn has_next(&mut self) -> bool {
        self.find_next()
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

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        iterator::{BasicWrappedIterator, CountedIteratorExt, IntoCounted},
        util::Status,
    };

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce()) {
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        (fired, move || f.set(f.get() + 1))
    }

    #[test]
    fn test_callback_fires_after_last_element() {
        let (fired, cb) = counter();
        let mut iter = BasicWrappedIterator::from_vec(vec!["a", "b"]).on_exhausted(cb);
        assert_eq!(iter.next(), Some("a"));
        assert_eq!(fired.get(), 0);
        assert_eq!(iter.next(), Some("b"));
        // detected eagerly, right after the last element was handed out
        assert_eq!(fired.get(), 1);
        assert!(iter.callback_fired());
        assert!(!iter.has_next());
        assert_eq!(iter.next(), None);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_callback_fires_once() {
        let (fired, cb) = counter();
        let mut iter = BasicWrappedIterator::from_vec(Vec::<u8>::new()).on_exhausted(cb);
        for _ in 0..5 {
            assert!(!iter.has_next());
        }
        assert_eq!(iter.next(), None);
        iter.close().unwrap();
        iter.close().unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_has_next_idempotent() {
        let (fired, cb) = counter();
        let mut iter = BasicWrappedIterator::from_vec(vec![1, 2, 3]).on_exhausted(cb);
        assert!(iter.has_next());
        assert!(iter.has_next());
        assert_eq!(iter.collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_error_items_do_not_fire_callback() {
        let (fired, cb) = counter();
        let items: Vec<std::result::Result<u32, Status>> =
            vec![Ok(1), Err(Status::io_error("boom")), Ok(3)];
        let mut iter = items.into_iter().counted().on_exhausted(cb);
        assert_eq!(iter.next().unwrap().unwrap(), 1);
        assert!(iter.next().unwrap().is_err());
        assert_eq!(fired.get(), 0);
        assert_eq!(iter.next().unwrap().unwrap(), 3);
        assert_eq!(fired.get(), 1);
        assert_eq!(iter.yielded(), 3);
    }

    #[test]
    fn test_size_is_forwarded() {
        let iter = BasicWrappedIterator::from_vec(vec![1, 2, 3]).on_exhausted(|| {});
        assert_eq!(iter.size(), Some(3));
        assert_eq!(iter.total_size(), Some(3));
    }
}

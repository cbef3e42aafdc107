use std::collections::VecDeque;

use log::warn;

use crate::{
    iterator::{CountedIterator, Lookahead},
    util::Result,
};

/// Lazily computes one extra element
///
/// Head adders receive the first element of the wrapped iterator, tail
/// adders the last one (when the tail adder remembers it). An `Err` result
/// skips the adder.
pub type Adder<T> = Box<dyn FnOnce(Option<&T>) -> Result<T>>;

/// When the adders of a [`HeadAdder`] or [`TailAdder`] run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddPolicy {
    #[default]
    Always,
    /// Only if the wrapped iterator yields nothing
    OnlyIfEmpty,
    /// Only if the wrapped iterator yields something
    OnlyIfNotEmpty,
}

impl AddPolicy {
    fn applies(self, wrapped_is_empty: bool) -> bool {
        match self {
            AddPolicy::Always => true,
            AddPolicy::OnlyIfEmpty => wrapped_is_empty,
            AddPolicy::OnlyIfNotEmpty => !wrapped_is_empty,
        }
    }

    /// Number of added elements given a known wrapped size
    fn added(self, wrapped_size: u64, adders: usize) -> u64 {
        if self.applies(wrapped_size == 0) {
            adders as u64
        } else {
            0
        }
    }
}

fn supplier<T, F>(f: F) -> Adder<T>
where
    F: FnOnce() -> Result<T> + 'static,
{
    Box::new(move |_: Option<&T>| f())
}

/// Prepends lazily computed elements to a counted iterator
///
/// Nothing runs before the first `has_next()`/`next()`. At that point the
/// first wrapped element is fetched (the policy needs to know whether there
/// is one) and handed to each adder in turn. Adders that fail are logged and
/// skipped; the remaining adders are still tried.
pub struct HeadAdder<I: Iterator> {
    inner: I,
    policy: AddPolicy,
    adders: VecDeque<Adder<I::Item>>,
    adder_count: usize,
    started: bool,
    first: Option<I::Item>,
    next: Lookahead<I::Item>,
    count: u64,
}

impl<I: CountedIterator> HeadAdder<I> {
    pub fn builder(inner: I) -> HeadAdderBuilder<I> {
        HeadAdderBuilder {
            inner,
            policy: AddPolicy::Always,
            adders: Vec::new(),
        }
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            self.next = match self.fetch() {
                Some(item) => Lookahead::Ready(item),
                None => Lookahead::Exhausted,
            };
        }
        self.next.is_ready()
    }

    fn fetch(&mut self) -> Option<I::Item> {
        if !self.started {
            self.started = true;
            self.first = self.inner.next();
            if !self.policy.applies(self.first.is_none()) {
                self.adders.clear();
            }
        }
        while let Some(adder) = self.adders.pop_front() {
            match adder(self.first.as_ref()) {
                Ok(item) => return Some(item),
                Err(e) => warn!("head adder failed, skipping it: {e}"),
            }
        }
        self.first.take().or_else(|| self.inner.next())
    }
}

impl<I: CountedIterator> Iterator for HeadAdder<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        self.find_next();
        let item = self.next.take()?;
        self.count += 1;
        Some(item)
    }
}

impl<I: CountedIterator> CountedIterator for HeadAdder<I> {
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    /// Wrapped size plus the adders the policy lets run
    ///
    /// Counts every adder as succeeding.
    fn size(&self) -> Option<u64> {
        let size = self.inner.size()?;
        Some(size + self.policy.added(size, self.adder_count))
    }

    fn total_size(&self) -> Option<u64> {
        let total = self.inner.total_size()?;
        let added = self.inner.size().map_or(0, |size| self.policy.added(size, self.adder_count));
        Some(total + added)
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

pub struct HeadAdderBuilder<I: Iterator> {
    inner: I,
    policy: AddPolicy,
    adders: Vec<Adder<I::Item>>,
}

impl<I: CountedIterator> HeadAdderBuilder<I> {
    pub fn policy(mut self, policy: AddPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn only_if_empty(self) -> Self {
        self.policy(AddPolicy::OnlyIfEmpty)
    }

    pub fn only_if_not_empty(self) -> Self {
        self.policy(AddPolicy::OnlyIfNotEmpty)
    }

    /// Add an adder that sees the first wrapped element
    pub fn adder<F>(mut self, adder: F) -> Self
    where
        F: FnOnce(Option<&I::Item>) -> Result<I::Item> + 'static,
    {
        self.adders.push(Box::new(adder));
        self
    }

    /// Add an adder that needs no input
    pub fn supplier<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Result<I::Item> + 'static,
    {
        self.adders.push(supplier(f));
        self
    }

    pub fn build(self) -> HeadAdder<I> {
        HeadAdder {
            inner: self.inner,
            policy: self.policy,
            adder_count: self.adders.len(),
            adders: self.adders.into(),
            started: false,
            first: None,
            next: Lookahead::NotFetched,
            count: 0,
        }
    }
}

/// Appends lazily computed elements to a counted iterator
///
/// The adders only run once the wrapped iterator is exhausted, one per
/// requested element. With [`TailAdderBuilder::remember_last`] each adder
/// receives a copy of the last wrapped element.
pub struct TailAdder<I: Iterator> {
    inner: I,
    policy: AddPolicy,
    adders: VecDeque<Adder<I::Item>>,
    adder_count: usize,
    keep_last: Option<fn(&I::Item) -> I::Item>,
    last: Option<I::Item>,
    wrapped_count: u64,
    in_tail: bool,
    next: Lookahead<I::Item>,
    count: u64,
}

impl<I: CountedIterator> TailAdder<I> {
    pub fn builder(inner: I) -> TailAdderBuilder<I> {
        TailAdderBuilder {
            inner,
            policy: AddPolicy::Always,
            adders: Vec::new(),
            keep_last: None,
        }
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            self.next = match self.fetch() {
                Some(item) => Lookahead::Ready(item),
                None => Lookahead::Exhausted,
            };
        }
        self.next.is_ready()
    }

    fn fetch(&mut self) -> Option<I::Item> {
        if !self.in_tail {
            if let Some(item) = self.inner.next() {
                self.wrapped_count += 1;
                if let Some(keep) = self.keep_last {
                    self.last = Some(keep(&item));
                }
                return Some(item);
            }
            self.in_tail = true;
            if !self.policy.applies(self.wrapped_count == 0) {
                self.adders.clear();
            }
        }
        while let Some(adder) = self.adders.pop_front() {
            match adder(self.last.as_ref()) {
                Ok(item) => return Some(item),
                Err(e) => warn!("tail adder failed, skipping it: {e}"),
            }
        }
        None
    }

    /// The last element taken from the wrapped iterator, if remembered
    pub fn last(&self) -> Option<&I::Item> {
        self.last.as_ref()
    }
}

impl<I: CountedIterator> Iterator for TailAdder<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        self.find_next();
        let item = self.next.take()?;
        self.count += 1;
        Some(item)
    }
}

impl<I: CountedIterator> CountedIterator for TailAdder<I> {
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    /// Wrapped size plus the adders the policy lets run
    ///
    /// Counts every adder as succeeding.
    fn size(&self) -> Option<u64> {
        let size = self.inner.size()?;
        Some(size + self.policy.added(size, self.adder_count))
    }

    fn total_size(&self) -> Option<u64> {
        let total = self.inner.total_size()?;
        let added = self.inner.size().map_or(0, |size| self.policy.added(size, self.adder_count));
        Some(total + added)
    }

    fn yielded(&self) -> u64 {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

pub struct TailAdderBuilder<I: Iterator> {
    inner: I,
    policy: AddPolicy,
    adders: Vec<Adder<I::Item>>,
    keep_last: Option<fn(&I::Item) -> I::Item>,
}

impl<I: CountedIterator> TailAdderBuilder<I> {
    pub fn policy(mut self, policy: AddPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn only_if_empty(self) -> Self {
        self.policy(AddPolicy::OnlyIfEmpty)
    }

    pub fn only_if_not_empty(self) -> Self {
        self.policy(AddPolicy::OnlyIfNotEmpty)
    }

    /// Add an adder that sees the last wrapped element (see `remember_last`)
    pub fn adder<F>(mut self, adder: F) -> Self
    where
        F: FnOnce(Option<&I::Item>) -> Result<I::Item> + 'static,
    {
        self.adders.push(Box::new(adder));
        self
    }

    /// Add an adder that needs no input
    pub fn supplier<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Result<I::Item> + 'static,
    {
        self.adders.push(supplier(f));
        self
    }

    pub fn build(self) -> TailAdder<I> {
        TailAdder {
            inner: self.inner,
            policy: self.policy,
            adder_count: self.adders.len(),
            adders: self.adders.into(),
            keep_last: self.keep_last,
            last: None,
            wrapped_count: 0,
            in_tail: false,
            next: Lookahead::NotFetched,
            count: 0,
        }
    }
}

impl<I> TailAdderBuilder<I>
where
    I: CountedIterator,
    I::Item: Clone,
{
    /// Keep a copy of the last wrapped element for the adders
    pub fn remember_last(mut self) -> Self {
        self.keep_last = Some(<I::Item as Clone>::clone);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        iterator::{BasicWrappedIterator, IntoCounted, empty},
        util::Status,
    };

    #[test]
    fn test_head_adder() {
        let iter = HeadAdder::builder(BasicWrappedIterator::from_vec(vec!["a", "b"]))
            .supplier(|| Ok("head"))
            .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec!["head", "a", "b"]);
    }

    #[test]
    fn test_head_adder_sees_first() {
        let iter = HeadAdder::builder(BasicWrappedIterator::from_vec(vec![10, 11]))
            .adder(|first| Ok(first.map_or(0, |f| f - 1)))
            .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec![9, 10, 11]);
    }

    #[test]
    fn test_head_adder_is_lazy() {
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let mut iter = HeadAdder::builder(BasicWrappedIterator::from_vec(vec![1]))
            .supplier(move || {
                r.set(true);
                Ok(0)
            })
            .build();
        assert!(!ran.get());
        assert!(iter.has_next());
        assert!(ran.get());
        assert_eq!(iter.yielded(), 0);
    }

    #[test]
    fn test_head_adder_only_if_empty() {
        let iter = HeadAdder::builder(BasicWrappedIterator::from_vec(vec!["a"]))
            .only_if_empty()
            .supplier(|| Ok("x"))
            .build();
        assert_eq!(iter.size(), Some(1));
        assert_eq!(iter.collect::<Vec<_>>(), vec!["a"]);

        let iter = HeadAdder::builder(empty()).only_if_empty().supplier(|| Ok("x")).build();
        assert_eq!(iter.size(), Some(1));
        assert_eq!(iter.collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_head_adder_only_if_not_empty() {
        let iter = HeadAdder::builder(empty::<&str>()).only_if_not_empty().supplier(|| Ok("x")).build();
        assert_eq!(iter.size(), Some(0));
        assert_eq!(iter.count(), 0);
    }

    #[test]
    fn test_head_adder_skips_failing_adder() {
        let iter = HeadAdder::builder(BasicWrappedIterator::from_vec(vec!["a"]))
            .supplier(|| Err(Status::value_read("no head")))
            .supplier(|| Ok("second"))
            .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec!["second", "a"]);
    }

    #[test]
    fn test_tail_adder() {
        let mut iter = TailAdder::builder(BasicWrappedIterator::from_vec(vec!["a", "b"]))
            .supplier(|| Ok("c"))
            .supplier(|| Ok("d"))
            .build();
        assert_eq!(iter.size(), Some(4));
        assert_eq!(iter.by_ref().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert_eq!(iter.yielded(), 4);
        assert!(!iter.has_next());
    }

    #[test]
    fn test_tail_adder_with_last() {
        let iter = TailAdder::builder(BasicWrappedIterator::from_vec(vec![1, 2, 3]))
            .remember_last()
            .adder(|last| Ok(last.copied().unwrap_or(0) * 100))
            .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec![1, 2, 3, 300]);
    }

    #[test]
    fn test_tail_adder_null_result_is_element() {
        let source = BasicWrappedIterator::from_vec(vec![Some(1)]);
        let iter = TailAdder::builder(source).supplier(|| Ok(None)).build();
        assert_eq!(iter.collect::<Vec<_>>(), vec![Some(1), None]);
    }

    #[test]
    fn test_tail_adder_policies() {
        let iter = TailAdder::builder(empty::<&str>()).only_if_empty().supplier(|| Ok("nothing found")).build();
        assert_eq!(iter.collect::<Vec<_>>(), vec!["nothing found"]);

        let iter = TailAdder::builder(BasicWrappedIterator::from_vec(vec!["a"]))
            .only_if_empty()
            .supplier(|| Ok("nothing found"))
            .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec!["a"]);

        let iter = TailAdder::builder(BasicWrappedIterator::from_vec(vec!["a"]))
            .only_if_not_empty()
            .supplier(|| Ok("end"))
            .build();
        assert_eq!(iter.collect::<Vec<_>>(), vec!["a", "end"]);
    }

    #[test]
    fn test_tail_adder_skips_failing_adders() {
        let iter = TailAdder::builder(vec!["a"].into_iter().counted())
            .supplier(|| Err(Status::value_read("first fails")))
            .supplier(|| Ok("b"))
            .supplier(|| Err(Status::value_read("third fails")))
            .build();
        assert_eq!(iter.size(), None);
        assert_eq!(iter.collect::<Vec<_>>(), vec!["a", "b"]);
    }
}

//! Property-based invariant testing for counted iterators
//!
//! Every decorator is checked against a model built from plain `Vec`
//! operations on the same input. Proptest shrinks failures to a minimal
//! input and saves it to `.proptest-regressions`, so a fixed bug stays
//! fixed.
//!
//! # Invariant Categories
//!
//! ## 1. Lookahead Invariants
//! - `has_next()` is idempotent: asking twice pulls nothing new
//! - `yielded()` equals the number of elements handed out
//!
//! ## 2. Decorator Models
//! - Filtering equals `Vec::retain`
//! - A window equals `skip(offset).take(max)`, and its size matches
//! - Adders put their elements at the ends, or not at all
//!
//! ## 3. Merge Invariants
//! - Output is sorted and a permutation of the input
//! - Equal elements come out in source order
//! - Both strategies produce the same sequence
//!
//! ## 4. JSON Stream Invariants
//! - Written streams read back unchanged; nulls are skipped but counted

use std::{cell::Cell, rc::Rc};

use counted_iter::{
    AddPolicy, BasicWrappedIterator, CountedIterator, CountedIteratorExt, HeadAdder, IntoCounted, JsonArrayIterator,
    MergeStrategy, MergedSortedIterator, Status, TailAdder, WriteOptions, json,
};
use proptest::prelude::*;
use serde_json::{Value, json};

// ============================================================================
// Helper Functions
// ============================================================================

fn arbitrary_items() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..1000, 0..=200)
}

fn arbitrary_sorted_sources() -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(
        prop::collection::vec(0u32..50, 0..=40).prop_map(|mut v| {
            v.sort_unstable();
            v
        }),
        0..=6,
    )
}

#[derive(Debug, Clone, Copy)]
enum Step {
    HasNext,
    Next,
}

fn arbitrary_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(prop_oneof![Just(Step::HasNext), Just(Step::Next)], 0..=300)
}

fn sources_of(sorted: &[Vec<u32>]) -> Vec<BasicWrappedIterator<std::vec::IntoIter<(u32, usize)>>> {
    sorted
        .iter()
        .enumerate()
        .map(|(index, items)| BasicWrappedIterator::from_vec(items.iter().map(|&n| (n, index)).collect()))
        .collect()
}

// ============================================================================
// Property 1: Lookahead
// ============================================================================
// Property: Interleaving has_next() calls never changes the sequence and
// pulls at most one element ahead

proptest! {
    #[test]
    fn prop_has_next_is_idempotent(items in arbitrary_items(), steps in arbitrary_steps()) {
        let pulled = Rc::new(Cell::new(0usize));
        let p = pulled.clone();
        let mut iter = items.clone().into_iter().inspect(move |_| p.set(p.get() + 1)).counted();

        let mut got = Vec::new();
        for step in steps {
            match step {
                Step::HasNext => {
                    let expected = got.len() < items.len();
                    prop_assert_eq!(iter.has_next(), expected);
                    prop_assert_eq!(iter.has_next(), expected);
                },
                Step::Next => got.extend(iter.next()),
            }
            prop_assert!(pulled.get() <= got.len() + 1);
            prop_assert_eq!(iter.yielded(), got.len() as u64);
        }
        got.extend(iter.by_ref());
        prop_assert_eq!(got, items);
        prop_assert!(!iter.has_next());
    }
}

// ============================================================================
// Property 2: Decorator Models
// ============================================================================

proptest! {
    #[test]
    fn prop_filter_matches_retain(items in arbitrary_items(), modulus in 1u32..10) {
        let mut iter = items.clone().into_iter().counted().filtered(move |n| n % modulus == 0);
        let got: Vec<u32> = iter.by_ref().collect();

        let mut expected = items;
        expected.retain(|n| n % modulus == 0);
        prop_assert_eq!(iter.yielded(), expected.len() as u64);
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_window_matches_skip_take(items in arbitrary_items(), offset in 0u64..250, max in prop::option::of(0u64..250)) {
        let mut builder = BasicWrappedIterator::from_vec(items.clone()).max_offset().offset(offset);
        if let Some(max) = max {
            builder = builder.max(max);
        }
        let iter = builder.build();
        let expected: Vec<u32> = items
            .iter()
            .copied()
            .skip(offset as usize)
            .take(max.map_or(usize::MAX, |m| m as usize))
            .collect();

        prop_assert_eq!(iter.size(), Some(expected.len() as u64));
        prop_assert_eq!(iter.total_size(), Some(items.len() as u64));
        prop_assert_eq!(iter.collect::<Vec<_>>(), expected);
    }

    #[test]
    fn prop_adders_follow_policy(items in arbitrary_items(), policy_index in 0usize..3) {
        let policy = [AddPolicy::Always, AddPolicy::OnlyIfEmpty, AddPolicy::OnlyIfNotEmpty][policy_index];
        let applies = match policy {
            AddPolicy::Always => true,
            AddPolicy::OnlyIfEmpty => items.is_empty(),
            AddPolicy::OnlyIfNotEmpty => !items.is_empty(),
        };

        let head = HeadAdder::builder(BasicWrappedIterator::from_vec(items.clone()))
            .policy(policy)
            .supplier(|| Ok(u32::MAX))
            .build();
        let iter = TailAdder::builder(head).policy(policy).supplier(|| Ok(u32::MAX - 1)).build();

        let mut expected = items.clone();
        if applies {
            expected.insert(0, u32::MAX);
        }
        // the head element makes the tail adder see a non-empty stream
        let tail_applies = match policy {
            AddPolicy::Always => true,
            AddPolicy::OnlyIfEmpty => expected.is_empty(),
            AddPolicy::OnlyIfNotEmpty => !expected.is_empty(),
        };
        if tail_applies {
            expected.push(u32::MAX - 1);
        }
        prop_assert_eq!(iter.size(), Some(expected.len() as u64));
        prop_assert_eq!(iter.collect::<Vec<_>>(), expected);
    }
}

// ============================================================================
// Property 3: Merge
// ============================================================================
// Property: Merging sorted sources is a stable sort of their concatenation

proptest! {
    #[test]
    fn prop_merge_is_stable_sort(sorted in arbitrary_sorted_sources()) {
        let mut expected: Vec<(u32, usize)> = sources_of(&sorted).into_iter().flatten().collect();
        expected.sort_by_key(|&(n, index)| (n, index));

        for strategy in [MergeStrategy::Queue, MergeStrategy::SameThread] {
            let merged = MergedSortedIterator::new(sources_of(&sorted), |a, b| a.0.cmp(&b.0), strategy);
            prop_assert_eq!(merged.size(), Some(expected.len() as u64));
            let got: Vec<(u32, usize)> = merged.collect();
            prop_assert_eq!(&got, &expected);
        }
    }

    #[test]
    fn prop_merge_window_matches_model(sorted in arbitrary_sorted_sources(), offset in 0u64..100, max in 0u64..100) {
        let mut all: Vec<u32> = sorted.iter().flatten().copied().collect();
        all.sort_unstable();
        let expected: Vec<u32> = all.into_iter().skip(offset as usize).take(max as usize).collect();

        let sources: Vec<_> = sorted.into_iter().map(|v| v.into_iter().counted_exact()).collect();
        let page = MergedSortedIterator::natural(sources, MergeStrategy::SameThread)
            .max_offset()
            .offset(offset)
            .max(max)
            .build();
        prop_assert_eq!(page.collect::<Vec<_>>(), expected);
    }
}

// ============================================================================
// Property 4: JSON Streams
// ============================================================================
// Property: A written stream reads back element for element; nulls are
// dropped from the output but not from the count

proptest! {
    #[test]
    fn prop_json_stream_round_trip(values in prop::collection::vec(prop::option::of(any::<i64>()), 0..=60)) {
        let elements: Vec<Value> = values.iter().map(|v| v.map_or(Value::Null, |n| json!({"n": n}))).collect();
        let mut source = BasicWrappedIterator::from_vec(elements).map_counted(Ok::<_, Status>);
        let mut out = Vec::new();
        json::write(&mut source, &mut out, &WriteOptions::default()).unwrap();

        let mut iter: JsonArrayIterator<Value, _> = JsonArrayIterator::new(out.as_slice()).unwrap();
        prop_assert_eq!(iter.size(), Some(values.len() as u64));
        let got: Vec<i64> = iter.by_ref().map(|v| v.unwrap()["n"].as_i64().unwrap()).collect();
        let expected: Vec<i64> = values.iter().flatten().copied().collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(iter.yielded(), values.len() as u64);
    }
}

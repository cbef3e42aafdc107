#![no_main]

use counted_iter::{CountedIterator, JsonArrayIterator};
use libfuzzer_sys::fuzz_target;

// Fuzz target for the streaming JSON array reader.
// Arbitrary input must never panic; a fatal error is yielded at most once and
// ends the stream.
fuzz_target!(|data: &[u8]| {
    let Ok(mut iter) = JsonArrayIterator::<serde_json::Value, _>::builder(data).objects_only(false).build() else {
        return;
    };

    let mut errors = 0;
    let mut yielded = 0u64;
    while let Some(item) = iter.next() {
        yielded += 1;
        if item.is_err() {
            errors += 1;
        }
    }
    assert!(errors <= 1, "fatal error yielded {errors} times");
    assert!(!iter.has_next());
    assert!(iter.yielded() >= yielded);
    assert_eq!(iter.yielded(), yielded + iter.found_nulls());
});

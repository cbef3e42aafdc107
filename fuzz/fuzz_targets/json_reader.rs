#![no_main]

use counted_iter::json::{JsonReader, MAX_DEPTH};
use libfuzzer_sys::fuzz_target;

// Fuzz target for the JSON pull parser.
// Every document serde_json accepts must produce the same tree; nothing may panic.
fuzz_target!(|data: &[u8]| {
    let mut reader = JsonReader::new(data);
    loop {
        match reader.next_token() {
            Ok(Some(_)) => assert!(reader.depth() <= MAX_DEPTH),
            Ok(None) => break,
            Err(e) => {
                assert!(e.is_corruption(), "unexpected error {e}");
                break;
            },
        }
    }

    // shallow inputs only: deep nesting hits the two depth limits differently
    if data.len() >= MAX_DEPTH {
        return;
    }
    if let Ok(expected) = serde_json::from_slice::<serde_json::Value>(data) {
        let mut reader = JsonReader::new(data);
        assert!(reader.next_token().unwrap().is_some());
        let tree = reader.read_value_as_tree().unwrap();
        assert_eq!(tree, Some(expected));
        assert_eq!(reader.next_token().unwrap(), None);
    }
});

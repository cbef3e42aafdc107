//! Streaming JSON arrays
//!
//! [`JsonArrayIterator`] turns a byte stream holding a JSON array into a
//! [`CountedIterator`](crate::iterator::CountedIterator), deserializing one
//! element at a time. The array may be embedded in an object whose leading
//! scalar fields announce its size:
//!
//! ```text
//! {"size": 2, "totalSize": 130, "array": [{...}, {...}]}
//!    ↓ preamble: size/totalSize captured, stops at '['
//! JsonReader (token pull parser)
//!    ↓ one tree per element
//! ValueCreator (serde by default)
//!    ↓
//! Result<T>
//! ```
//!
//! The [`writer`] functions go the other way and drain a counted iterator
//! into the same format.

use serde::{Deserialize, Serialize};

mod array_iterator;
mod reader;
mod token;
pub mod writer;

pub use array_iterator::{DeserializeValue, JsonArrayIterator, JsonArrayIteratorBuilder, ValueCreator};
pub use reader::{JsonReader, MAX_DEPTH};
pub use token::Token;
pub use writer::{write, write_array, write_logged, write_objects};

pub const DEFAULT_SIZE_FIELD: &str = "size";
pub const DEFAULT_TOTAL_SIZE_FIELD: &str = "totalSize";
pub const DEFAULT_ARRAY_FIELD: &str = "array";

/// How a [`JsonArrayIterator`] reads its stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonArrayOptions {
    /// Top-level integer field holding the array's size
    pub size_field: String,
    /// Top-level integer field holding the size of the whole result the
    /// array is a page of
    pub total_size_field: String,
    /// Count nulls in the array but do not yield them
    pub skip_nulls: bool,
    /// Treat array elements that are not objects as null
    pub objects_only: bool,
}

impl Default for JsonArrayOptions {
    fn default() -> Self {
        JsonArrayOptions {
            size_field: DEFAULT_SIZE_FIELD.to_string(),
            total_size_field: DEFAULT_TOTAL_SIZE_FIELD.to_string(),
            skip_nulls: true,
            objects_only: true,
        }
    }
}

/// How the [`writer`] functions lay out their output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WriteOptions {
    /// Write `{"array": [...]}` rather than a bare array
    pub wrap_in_object: bool,
    pub array_field: String,
    /// Write known sizes as `size`/`totalSize` fields before the array
    pub embed_sizes: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            wrap_in_object: true,
            array_field: DEFAULT_ARRAY_FIELD.to_string(),
            embed_sizes: true,
        }
    }
}

impl WriteOptions {
    /// A bare array, no sizes
    pub fn bare_array() -> Self {
        WriteOptions {
            wrap_in_object: false,
            embed_sizes: false,
            ..Default::default()
        }
    }
}

/// Why an array element was not yielded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Null,
    /// The value creator rejected the element
    Malformed,
}

/// Low-level progress of a [`JsonArrayIterator`], for observability
#[derive(Debug)]
pub enum ParseEvent<'a, T> {
    /// A token was read, in the preamble or at array level
    Token(Token),
    Size(u64),
    TotalSize(u64),
    /// The array was found
    Start,
    /// An element is about to be yielded
    Next(&'a T),
    Skipped(SkipReason),
    /// The stream ended, failed or was closed
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = JsonArrayOptions::default();
        assert_eq!(options.size_field, "size");
        assert_eq!(options.total_size_field, "totalSize");
        assert!(options.skip_nulls);
        assert!(options.objects_only);

        let write = WriteOptions::default();
        assert!(write.wrap_in_object);
        assert_eq!(write.array_field, "array");
    }

    #[test]
    fn test_options_from_config() {
        let options: JsonArrayOptions = serde_json::from_str(r#"{"sizeField": "count", "skipNulls": false}"#).unwrap();
        assert_eq!(
            options,
            JsonArrayOptions {
                size_field: "count".to_string(),
                skip_nulls: false,
                ..Default::default()
            }
        );

        let write: WriteOptions = serde_json::from_str(r#"{"arrayField": "items"}"#).unwrap();
        assert_eq!(write.array_field, "items");
        assert!(write.embed_sizes);
    }
}

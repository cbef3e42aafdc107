//! Draining counted iterators into JSON
//!
//! The iterators handed to these functions yield `Result` items, the same
//! shape a [`JsonArrayIterator`](super::JsonArrayIterator) produces. An
//! element that fails, either as an `Err` item or because it does not
//! serialize, is logged and its error message is written in its place. An
//! interruption anywhere in the error's cause chain is a request to stop:
//! the JSON written so far is closed properly and the write returns normally
//! with the number of elements written before it.

use std::{error::Error, io::Write};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    iterator::CountedIterator,
    json::{DEFAULT_SIZE_FIELD, DEFAULT_TOTAL_SIZE_FIELD, WriteOptions},
    util::{Result, is_interrupted},
};

/// Write `iter` laid out as `options` says; returns the number of elements
/// written
pub fn write<I, T, E, W>(iter: &mut I, out: W, options: &WriteOptions) -> Result<u64>
where
    I: CountedIterator<Item = std::result::Result<T, E>>,
    T: Serialize,
    E: Error + 'static,
    W: Write,
{
    write_logged(iter, out, options, |_: &T| {})
}

/// Write `iter` as a bare JSON array
pub fn write_array<I, T, E, W>(iter: &mut I, out: W) -> Result<u64>
where
    I: CountedIterator<Item = std::result::Result<T, E>>,
    T: Serialize,
    E: Error + 'static,
    W: Write,
{
    write(iter, out, &WriteOptions::bare_array())
}

/// Like [`write`], calling `logging` for every element written successfully
pub fn write_logged<I, T, E, W, L>(iter: &mut I, mut out: W, options: &WriteOptions, logging: L) -> Result<u64>
where
    I: CountedIterator<Item = std::result::Result<T, E>>,
    T: Serialize,
    E: Error + 'static,
    W: Write,
    L: FnMut(&T),
{
    if options.wrap_in_object {
        out.write_all(b"{")?;
        if options.embed_sizes {
            if let Some(size) = iter.size() {
                write_field(&mut out, DEFAULT_SIZE_FIELD)?;
                write!(out, "{size},")?;
            }
            if let Some(total) = iter.total_size() {
                write_field(&mut out, DEFAULT_TOTAL_SIZE_FIELD)?;
                write!(out, "{total},")?;
            }
        }
        write_field(&mut out, &options.array_field)?;
    }
    out.write_all(b"[")?;
    let written = write_objects(iter, &mut out, logging);
    out.write_all(b"]")?;
    if options.wrap_in_object {
        out.write_all(b"}")?;
    }
    out.flush()?;
    written
}

/// Write the elements of `iter`, comma separated, without enclosing brackets
///
/// Stops quietly at the first interruption; failures of `out` itself are
/// returned immediately.
pub fn write_objects<I, T, E, W, L>(iter: &mut I, out: &mut W, mut logging: L) -> Result<u64>
where
    I: CountedIterator<Item = std::result::Result<T, E>>,
    T: Serialize,
    E: Error + 'static,
    W: Write,
    L: FnMut(&T),
{
    let mut written = 0u64;
    let mut element = Vec::new();
    while let Some(item) = iter.next() {
        element.clear();
        let failure: Option<Box<dyn Error + Send + Sync>> = match &item {
            Ok(value) => match serde_json::to_writer(&mut element, value) {
                Ok(()) => None,
                Err(e) => Some(Box::new(e)),
            },
            Err(e) if is_interrupted(e) => {
                debug!("writing json interrupted after {written} elements: {e}");
                return Ok(written);
            },
            Err(e) => Some(e.to_string().into()),
        };
        if let Some(failure) = failure {
            if is_interrupted(&*failure) {
                debug!("writing json interrupted after {written} elements: {failure}");
                return Ok(written);
            }
            warn!("failed to write element {written}: {failure}");
            element.clear();
            serde_json::to_writer(&mut element, &failure.to_string())?;
        }
        if written > 0 {
            out.write_all(b",")?;
        }
        out.write_all(&element)?;
        written += 1;
        if let Ok(value) = &item {
            logging(value);
        }
    }
    Ok(written)
}

fn write_field<W: Write>(out: &mut W, name: &str) -> Result<()> {
    serde_json::to_writer(&mut *out, name)?;
    out.write_all(b":")?;
    Ok(())
}

use std::{
    io::{BufRead, BufReader, Read},
    sync::Arc,
};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    iterator::{CountedIterator, Lookahead},
    json::{JsonArrayOptions, JsonReader, ParseEvent, SkipReason, Token},
    statistics::ParseStatistics,
    util::{Result, Status},
};

type Listener<T> = Box<dyn FnMut(&ParseEvent<'_, T>)>;
type Callback = Box<dyn FnOnce()>;

/// Turns the tree of one array element into an item
pub trait ValueCreator<T, R> {
    fn create(&mut self, reader: &JsonReader<R>, tree: &Value) -> Result<T>;
}

impl<T, R, F> ValueCreator<T, R> for F
where
    F: FnMut(&JsonReader<R>, &Value) -> Result<T>,
{
    fn create(&mut self, reader: &JsonReader<R>, tree: &Value) -> Result<T> {
        self(reader, tree)
    }
}

/// Deserializes elements with serde
#[derive(Debug, Clone, Copy, Default)]
pub struct DeserializeValue;

impl<T: DeserializeOwned, R> ValueCreator<T, R> for DeserializeValue {
    fn create(&mut self, _reader: &JsonReader<R>, tree: &Value) -> Result<T> {
        T::deserialize(tree).map_err(|e| Status::value_read(e.to_string()).with_cause(e))
    }
}

fn emit<T>(listeners: &mut [Listener<T>], event: ParseEvent<'_, T>) {
    for listener in listeners.iter_mut() {
        listener(&event);
    }
}

/// Incrementally deserializes a JSON array from a byte stream
///
/// Building the iterator reads the stream up to the first `[`, picking up
/// the integer fields named by [`JsonArrayOptions::size_field`] and
/// [`JsonArrayOptions::total_size_field`] directly inside the top-level
/// object on the way. Elements are then read one at a time, only when asked
/// for.
///
/// The array read is the first `[` in the stream at any depth, not the one
/// under a particular field name. In `{"tags": ["x"], "array": [...]}` the
/// `tags` array is the one iterated; size fields placed after it are never
/// seen.
///
/// # Elements
///
/// - Nulls are skipped when `skip_nulls` is set. They are still counted:
///   `yielded()` includes them once a later element is yielded or the
///   stream ends.
/// - An element the value creator rejects is logged and skipped, and counted
///   like a null. One bad element does not end the stream.
/// - A syntax or I/O error is fatal. It is yielded once as an `Err` item,
///   after which the iterator is exhausted.
///
/// # Completion
///
/// The completion callback runs exactly once: when the array ends, on a
/// fatal error, on `close()`, or, with a warning, when the iterator is
/// dropped before any of those. The reader (and the stream it owns) is
/// released at the same moment.
pub struct JsonArrayIterator<T, R, C = DeserializeValue> {
    reader: Option<JsonReader<R>>,
    value_creator: C,
    options: JsonArrayOptions,
    callback: Option<Callback>,
    listeners: Vec<Listener<T>>,
    size: Option<u64>,
    total_size: Option<u64>,
    next: Lookahead<Result<T>>,
    pending_nulls: u64,
    found_nulls: u64,
    count: u64,
}

impl<T, R: BufRead> JsonArrayIterator<T, R, DeserializeValue> {
    pub fn builder(reader: R) -> JsonArrayIteratorBuilder<T, R, DeserializeValue> {
        JsonArrayIteratorBuilder {
            reader,
            value_creator: DeserializeValue,
            options: JsonArrayOptions::default(),
            callback: None,
            listeners: Vec::new(),
        }
    }

    /// Read with default options, deserializing elements with serde
    pub fn new(reader: R) -> Result<Self>
    where
        T: DeserializeOwned,
    {
        Self::builder(reader).build()
    }
}

impl<T, R: Read> JsonArrayIterator<T, BufReader<R>, DeserializeValue> {
    /// Like [`JsonArrayIterator::new`], buffering an unbuffered stream
    pub fn from_reader(reader: R) -> Result<Self>
    where
        T: DeserializeOwned,
    {
        Self::new(BufReader::new(reader))
    }
}

impl<T, R, C> JsonArrayIterator<T, R, C>
where
    R: BufRead,
    C: ValueCreator<T, R>,
{
    /// Consume tokens up to the start of the array
    fn scan_preamble(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        loop {
            let Some(token) = reader.next_token()? else {
                warn!("no array found in json stream, treating it as empty");
                return Ok(false);
            };
            emit(&mut self.listeners, ParseEvent::Token(token));
            match token {
                Token::StartArray => break,
                Token::Number if reader.depth() == 1 && reader.in_object() => {
                    let name = reader.current_name();
                    let value = reader.u64_value();
                    if name == Some(self.options.size_field.as_str()) {
                        if let Some(size) = value {
                            self.size = Some(size);
                            emit(&mut self.listeners, ParseEvent::Size(size));
                        }
                    }
                    if name == Some(self.options.total_size_field.as_str()) {
                        if let Some(total) = value {
                            self.total_size = Some(total);
                            emit(&mut self.listeners, ParseEvent::TotalSize(total));
                        }
                    }
                },
                _ => {},
            }
        }
        debug!(
            "json array found at offset {}, size {:?}, total size {:?}",
            reader.offset(),
            self.size,
            self.total_size
        );
        emit(&mut self.listeners, ParseEvent::Start);
        Ok(true)
    }

    fn find_next(&mut self) -> bool {
        if let Lookahead::NotFetched = self.next {
            self.next = match self.read_element() {
                Ok(Some(item)) => Lookahead::Ready(Ok(item)),
                Ok(None) => {
                    self.finish();
                    Lookahead::Exhausted
                },
                Err(e) => {
                    warn!("json array stream failed: {e}");
                    self.finish();
                    Lookahead::Ready(Err(e))
                },
            };
        }
        self.next.is_ready()
    }

    fn read_element(&mut self) -> Result<Option<T>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            let Some(token) = reader.next_token()? else {
                return Ok(None);
            };
            emit(&mut self.listeners, ParseEvent::Token(token));
            let tree = match token {
                Token::EndArray => return Ok(None),
                Token::StartObject | Token::Null => reader.read_value_as_tree()?,
                _ if !self.options.objects_only => reader.read_value_as_tree()?,
                other => {
                    debug!("expected an object in json array but got {other}, treating it as null");
                    reader.read_value_as_tree()?;
                    None
                },
            }
            .unwrap_or(Value::Null);

            if tree.is_null() && self.options.skip_nulls {
                self.pending_nulls += 1;
                self.found_nulls += 1;
                emit(&mut self.listeners, ParseEvent::Skipped(SkipReason::Null));
                continue;
            }
            match self.value_creator.create(reader, &tree) {
                Ok(item) => {
                    if self.pending_nulls > 0 {
                        warn!("found {} nulls in json array, they are skipped", self.pending_nulls);
                    }
                    emit(&mut self.listeners, ParseEvent::Next(&item));
                    return Ok(Some(item));
                },
                Err(e) => {
                    self.pending_nulls += 1;
                    self.found_nulls += 1;
                    warn!("{e} for {tree}, skipping it");
                    emit(&mut self.listeners, ParseEvent::Skipped(SkipReason::Malformed));
                },
            }
        }
    }

    /// Release the stream and run the completion callback, once
    fn finish(&mut self) {
        self.count += self.pending_nulls;
        self.pending_nulls = 0;
        let released = self.reader.take().is_some();
        if let Some(callback) = self.callback.take() {
            callback();
        }
        if released {
            emit(&mut self.listeners, ParseEvent::End);
        }
    }

    /// The element the next `next()` returns, if any
    pub fn peek(&mut self) -> Option<&Result<T>> {
        self.find_next();
        self.next.peek()
    }

    /// Nulls and rejected elements skipped so far
    pub fn found_nulls(&self) -> u64 {
        self.found_nulls
    }

    pub fn options(&self) -> &JsonArrayOptions {
        &self.options
    }

    /// Whether the stream is still open
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

impl<T, R, C> Iterator for JsonArrayIterator<T, R, C>
where
    R: BufRead,
    C: ValueCreator<T, R>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        self.find_next();
        let item = self.next.take()?;
        self.count += self.pending_nulls + 1;
        self.pending_nulls = 0;
        Some(item)
    }
}

impl<T, R, C> CountedIterator for JsonArrayIterator<T, R, C>
where
    R: BufRead,
    C: ValueCreator<T, R>,
{
    fn has_next(&mut self) -> bool {
        self.find_next()
    }

    /// The announced size, if the stream had one
    fn size(&self) -> Option<u64> {
        self.size
    }

    fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Elements yielded plus the nulls and rejected elements passed so far
    fn yielded(&self) -> u64 {
        self.count
    }

    /// Release the stream; an element already peeked is still returned
    fn close(&mut self) -> Result<()> {
        self.finish();
        Ok(())
    }
}

impl<T, R, C> Drop for JsonArrayIterator<T, R, C> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!("json array iterator dropped before it was exhausted or closed");
            callback();
        }
    }
}

/// Configures a [`JsonArrayIterator`]
pub struct JsonArrayIteratorBuilder<T, R, C> {
    reader: R,
    value_creator: C,
    options: JsonArrayOptions,
    callback: Option<Callback>,
    listeners: Vec<Listener<T>>,
}

impl<T, R: BufRead, C> JsonArrayIteratorBuilder<T, R, C> {
    pub fn options(mut self, options: JsonArrayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn size_field(mut self, name: impl Into<String>) -> Self {
        self.options.size_field = name.into();
        self
    }

    pub fn total_size_field(mut self, name: impl Into<String>) -> Self {
        self.options.total_size_field = name.into();
        self
    }

    pub fn skip_nulls(mut self, skip_nulls: bool) -> Self {
        self.options.skip_nulls = skip_nulls;
        self
    }

    pub fn objects_only(mut self, objects_only: bool) -> Self {
        self.options.objects_only = objects_only;
        self
    }

    /// Run `callback` once the stream is done with (see [`JsonArrayIterator`])
    pub fn callback<F: FnOnce() + 'static>(mut self, callback: F) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Receive the low-level parse events
    pub fn event_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&ParseEvent<'_, T>) + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Count the parse events in `stats`
    pub fn statistics(mut self, stats: Arc<ParseStatistics>) -> Self
    where
        T: 'static,
    {
        self.listeners.push(Box::new(stats.listener::<T>()));
        self
    }

    /// Replace the element conversion
    pub fn value_creator<F>(self, value_creator: F) -> JsonArrayIteratorBuilder<T, R, F>
    where
        F: FnMut(&JsonReader<R>, &Value) -> Result<T>,
    {
        JsonArrayIteratorBuilder {
            reader: self.reader,
            value_creator,
            options: self.options,
            callback: self.callback,
            listeners: self.listeners,
        }
    }

    /// Read the stream up to the start of the array
    ///
    /// Stops at the first `[` at any depth, so the array wanted must be the
    /// first array-valued field of the stream. Size fields only count
    /// directly inside the top-level object.
    ///
    /// Fails, after running the callback, if the preamble is not valid JSON
    /// or cannot be read.
    pub fn build(self) -> Result<JsonArrayIterator<T, R, C>>
    where
        C: ValueCreator<T, R>,
    {
        let mut iter = JsonArrayIterator {
            reader: Some(JsonReader::new(self.reader)),
            value_creator: self.value_creator,
            options: self.options,
            callback: self.callback,
            listeners: self.listeners,
            size: None,
            total_size: None,
            next: Lookahead::NotFetched,
            pending_nulls: 0,
            found_nulls: 0,
            count: 0,
        };
        match iter.scan_preamble() {
            Ok(true) => Ok(iter),
            Ok(false) => {
                iter.next = Lookahead::Exhausted;
                iter.finish();
                Ok(iter)
            },
            Err(e) => {
                iter.finish();
                Err(e)
            },
        }
    }
}

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::json::{ParseEvent, SkipReason};

/// JSON streaming statistics
///
/// Thread-safe counters fed by the parse events of one or more
/// [`JsonArrayIterator`](crate::json::JsonArrayIterator)s. Uses atomic
/// counters for lock-free updates, so one instance can be shared by
/// iterators on different threads.
#[derive(Debug, Default)]
pub struct ParseStatistics {
    // Preamble
    pub arrays_started: AtomicU64,
    pub sizes_announced: AtomicU64,
    pub total_sizes_announced: AtomicU64,

    // Tokens
    pub tokens_read: AtomicU64,

    // Elements
    pub elements_yielded: AtomicU64,
    pub nulls_skipped: AtomicU64,
    pub malformed_skipped: AtomicU64,

    // Lifecycle
    pub streams_ended: AtomicU64,
}

impl ParseStatistics {
    pub fn new() -> Self {
        ParseStatistics::default()
    }

    /// Update the counters for one event
    pub fn record<T>(&self, event: &ParseEvent<'_, T>) {
        match event {
            ParseEvent::Token(_) => self.record_token(),
            ParseEvent::Size(_) => {
                self.sizes_announced.fetch_add(1, Ordering::Relaxed);
            },
            ParseEvent::TotalSize(_) => {
                self.total_sizes_announced.fetch_add(1, Ordering::Relaxed);
            },
            ParseEvent::Start => {
                self.arrays_started.fetch_add(1, Ordering::Relaxed);
            },
            ParseEvent::Next(_) => self.record_element(),
            ParseEvent::Skipped(reason) => self.record_skip(*reason),
            ParseEvent::End => {
                self.streams_ended.fetch_add(1, Ordering::Relaxed);
            },
        }
    }

    /// An event listener recording into these statistics
    pub fn listener<T: 'static>(self: Arc<Self>) -> impl FnMut(&ParseEvent<'_, T>) + 'static {
        move |event: &ParseEvent<'_, T>| self.record(event)
    }

    #[inline]
    pub fn record_token(&self) {
        self.tokens_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_element(&self) {
        self.elements_yielded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skip(&self, reason: SkipReason) {
        match reason {
            SkipReason::Null => self.nulls_skipped.fetch_add(1, Ordering::Relaxed),
            SkipReason::Malformed => self.malformed_skipped.fetch_add(1, Ordering::Relaxed),
        };
    }

    // Getters (snapshot values)
    pub fn arrays_started(&self) -> u64 {
        self.arrays_started.load(Ordering::Relaxed)
    }

    pub fn tokens_read(&self) -> u64 {
        self.tokens_read.load(Ordering::Relaxed)
    }

    pub fn elements_yielded(&self) -> u64 {
        self.elements_yielded.load(Ordering::Relaxed)
    }

    pub fn nulls_skipped(&self) -> u64 {
        self.nulls_skipped.load(Ordering::Relaxed)
    }

    pub fn malformed_skipped(&self) -> u64 {
        self.malformed_skipped.load(Ordering::Relaxed)
    }

    pub fn streams_ended(&self) -> u64 {
        self.streams_ended.load(Ordering::Relaxed)
    }

    /// Share of array elements that were skipped
    pub fn skip_rate(&self) -> f64 {
        let skipped = (self.nulls_skipped() + self.malformed_skipped()) as f64;
        let total = skipped + self.elements_yielded() as f64;
        if total > 0.0 { skipped / total } else { 0.0 }
    }

    /// Reset all statistics to zero
    pub fn reset(&self) {
        self.arrays_started.store(0, Ordering::Relaxed);
        self.sizes_announced.store(0, Ordering::Relaxed);
        self.total_sizes_announced.store(0, Ordering::Relaxed);
        self.tokens_read.store(0, Ordering::Relaxed);
        self.elements_yielded.store(0, Ordering::Relaxed);
        self.nulls_skipped.store(0, Ordering::Relaxed);
        self.malformed_skipped.store(0, Ordering::Relaxed);
        self.streams_ended.store(0, Ordering::Relaxed);
    }

    /// Get a formatted statistics report
    pub fn report(&self) -> String {
        format!(
            "JSON Stream Statistics:\n\
            \n\
            Preamble:\n\
            - Arrays started:   {}\n\
            - Sizes announced:  {}\n\
            - Totals announced: {}\n\
            \n\
            Elements:\n\
            - Tokens read:      {}\n\
            - Yielded:          {}\n\
            - Nulls skipped:    {}\n\
            - Malformed:        {}\n\
            - Skip rate:        {:.2}%\n\
            \n\
            Streams ended:      {}",
            self.arrays_started(),
            self.sizes_announced.load(Ordering::Relaxed),
            self.total_sizes_announced.load(Ordering::Relaxed),
            self.tokens_read(),
            self.elements_yielded(),
            self.nulls_skipped(),
            self.malformed_skipped(),
            self.skip_rate() * 100.0,
            self.streams_ended(),
        )
    }
}

pub mod iterator;
pub mod json;
pub mod statistics;
pub mod util;

pub use iterator::{
    AddPolicy, BasicWrappedIterator, BatchedReceiver, CallbackIterator, CountedIterator, CountedIteratorExt,
    CountedPeekingIterator, FilteringIterator, HeadAdder, IntoCounted, KeepAlive, MaxOffsetIterator, MergeStrategy,
    MergedSortedIterator, TailAdder, VecCursor, WrappedIterator,
};
pub use json::{JsonArrayIterator, JsonArrayOptions, WriteOptions};
pub use statistics::ParseStatistics;
pub use util::{Code, Result, Status};

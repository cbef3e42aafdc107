mod status;

pub use status::{Code, Result, Status, is_interrupted};

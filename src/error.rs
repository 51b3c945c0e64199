//! Error types for channel replication.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Array operation (`append`/`remove`) on a channel whose current value
    /// is not an array. Caller bug, not a recoverable condition.
    #[error("value is not array")]
    NotAnArray,

    /// Object operation (`set`/`delete`) on a channel whose current value is
    /// not an object. Caller bug, not a recoverable condition.
    #[error("value is not object")]
    NotAnObject,

    /// A channel with the same name already exists in this endpoint scope.
    #[error("channel name conflict: {0:?}")]
    NameConflict(String),

    /// `InitValue::Interval` spec without a full producer: the channel would
    /// have no defined initial value.
    #[error("interval init value needs a full producer")]
    IntervalWithoutFull,

    /// Group lookup for a window type that was never created.
    #[error("no channel group for window type {0:?}")]
    GroupNotFound(String),

    /// Group exists but is not of the requested concrete type.
    #[error("channel group for window type {0:?} has a different concrete type")]
    GroupTypeMismatch(String),

    /// Operation on a channel after `dispose()`.
    #[error("channel is disposed")]
    Disposed,

    #[error("value codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

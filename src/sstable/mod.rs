//! Immutable, sorted, on-disk tables (components H and I).
//!
//! An SSTable is the flushed form of a memtable: a sequence of data
//! blocks (component G) in internal-key order, an index block mapping
//! each data block's last key to its [`format::BlockHandle`], an
//! optional filter block, a metaindex block naming the filter, and a
//! fixed-size footer pointing at the metaindex and index blocks.
//! Grounded on `table/table_builder.h` and `table/table.h`.

#[cfg(test)]
mod tests;

pub mod builder;
pub mod format;
pub mod iterator;
pub mod reader;

pub use builder::SstableBuilder;
pub use format::{BlockHandle, Footer};
pub use iterator::SstableIterator;
pub use reader::SstableReader;

use thiserror::Error;

/// Errors raised building or reading an SSTable.
#[derive(Debug, Error)]
pub enum SstableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] format::FormatError),

    #[error(transparent)]
    Block(#[from] crate::block::BlockError),

    #[error("{0}")]
    Encoding(#[from] crate::encoding::EncodingError),

    #[error("keys must be added in strictly increasing order")]
    KeysOutOfOrder,

    #[error("table was already finished")]
    AlreadyFinished,
}

impl From<SstableError> for crate::error::Error {
    fn from(err: SstableError) -> Self {
        match err {
            SstableError::Io(e) => crate::error::Error::Io(e),
            SstableError::Format(e) => crate::error::Error::corruption(e.to_string()),
            SstableError::Block(e) => crate::error::Error::corruption(e.to_string()),
            SstableError::Encoding(e) => crate::error::Error::corruption(e.to_string()),
            SstableError::KeysOutOfOrder => crate::error::Error::invalid_argument(err.to_string()),
            SstableError::AlreadyFinished => crate::error::Error::invalid_argument(err.to_string()),
        }
    }
}

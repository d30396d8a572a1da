//! Crate-wide status taxonomy.
//!
//! Every module in this crate (`wal`, `memtable`, `sstable`, `block`, ...)
//! defines its own `thiserror` enum so that internal callers get precise,
//! named variants. At the boundary between modules — wherever a result
//! crosses from one component into another — errors convert into this
//! shared [`Error`] enum via `From`, matching the six-way taxonomy a
//! storage engine's public surface is expected to expose: a key not found,
//! on-disk corruption, a feature not supported, a bad argument, or an I/O
//! failure underneath everything.

use thiserror::Error;

/// The crate-wide status type.
///
/// Two errors carry a primary message and an optional secondary message,
/// joined by `": "` when displayed, mirroring the message-composition rule
/// used throughout the on-disk formats this crate implements.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested key (or a metadata entry such as a filter block) was
    /// not present at the consulted level.
    #[error("{}", join_messages(.0, .1))]
    NotFound(String, Option<String>),

    /// On-disk data failed a structural or checksum check.
    #[error("{}", join_messages(.0, .1))]
    Corruption(String, Option<String>),

    /// The requested operation or configuration is not supported.
    #[error("{}", join_messages(.0, .1))]
    NotSupported(String, Option<String>),

    /// A caller-supplied argument or configuration value is invalid.
    #[error("{}", join_messages(.0, .1))]
    InvalidArgument(String, Option<String>),

    /// The underlying file or OS operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A precondition internal to this crate was violated (e.g. an arena
    /// or skip-list invariant). These are treated as fatal per §4's
    /// failure semantics rather than surfaced as a recoverable status.
    #[error("{}", join_messages(.0, .1))]
    Internal(String, Option<String>),
}

impl Error {
    /// Construct a [`Error::NotFound`] with no secondary message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into(), None)
    }

    /// Construct a [`Error::Corruption`] with no secondary message.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into(), None)
    }

    /// Construct a [`Error::NotSupported`] with no secondary message.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported(msg.into(), None)
    }

    /// Construct a [`Error::InvalidArgument`] with no secondary message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into(), None)
    }

    /// Construct a [`Error::Internal`] with no secondary message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into(), None)
    }

    /// Returns `true` if this is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_, _))
    }

    /// Returns `true` if this is a [`Error::Corruption`].
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_, _))
    }
}

fn join_messages(primary: &str, secondary: &Option<String>) -> String {
    match secondary {
        Some(secondary) => format!("{primary}: {secondary}"),
        None => primary.to_string(),
    }
}

/// Convenience alias used throughout the crate's public surface.
pub type Result<T> = std::result::Result<T, Error>;

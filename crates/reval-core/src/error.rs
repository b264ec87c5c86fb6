//! # Error Types
//!
//! Errors raised while addressing the data tree. Path parsing itself is
//! total (every string normalizes to some path); only writes can fail.

use thiserror::Error;

/// Error while writing into the data tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A write tried to descend through a scalar value.
    #[error("cannot write '{path}': '{parent}' holds a {found}, not a container")]
    NotAContainer {
        /// Canonical path of the attempted write.
        path: String,
        /// Canonical path of the scalar that blocked the write.
        parent: String,
        /// JSON type name of the blocking value.
        found: &'static str,
    },

    /// An object key was used to address into an array.
    #[error("cannot write '{path}': key '{key}' does not index an array")]
    KeyIntoArray {
        /// Canonical path of the attempted write.
        path: String,
        /// The offending key.
        key: String,
    },

    /// An array index lies too far past the end of the array to pad.
    #[error("cannot write '{path}': index {index} is out of range for an array of length {len}")]
    IndexOutOfRange {
        /// Canonical path of the attempted write.
        path: String,
        /// The requested index.
        index: usize,
        /// Length of the array at the time of the write.
        len: usize,
    },
}

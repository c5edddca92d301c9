// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Crate-wide error kinds (spec.md §7).
//!
//! Core algorithm code (arena, trie, preprocessor, forward/backward, Viterbi)
//! returns [`Error`]; the CLI boundary wraps these in `anyhow::Result` with
//! additional context, the way the teacher crate's binary layer does.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An arena, context, or feature table failed to grow. Fatal for the
    /// sequence or iteration currently in flight.
    #[error("out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },

    /// The model file header or a chunk layout was not recognised.
    #[error("invalid model file {path}: {reason}")]
    InvalidModel { path: PathBuf, reason: String },

    /// The model file declares a format version this build does not support.
    #[error("incompatible model version {found} (expected {expected})")]
    Incompatible { found: u32, expected: u32 },

    /// A malformed training or feature-list record. The reader logs this and
    /// skips the record rather than aborting (spec.md §7 recovery policy).
    #[error("invalid input at line {line}: {reason}")]
    InvalidInput { line: usize, reason: String },

    /// An internal invariant was violated (e.g. a trie insertion reported
    /// `created = true` for a path expected to already exist). Indicates a
    /// bug in the preprocessor, never a data problem.
    #[error("internal logic error: {0}")]
    InternalLogic(String),

    /// An operation not available on the current object, e.g. `to_id` on a
    /// frozen (read-only) dictionary during tagging.
    #[error("not supported: {0}")]
    NotSupported(&'static str),
}

//! Fatal, chunk-level error taxonomy. Line-level parse failures never surface here;
//! they end up in the error-index artifact instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The chunk's extension is not one of `.txt`, `.gz`, `.zst`.
    #[error("unsupported chunk format '{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The parser found no schema artifact for a chunk.
    #[error("missing schema artifact {} for chunk '{chunk}'", path.display())]
    MissingSchema { chunk: String, path: PathBuf },

    /// The schema artifact found under this chunk's name was written for another file.
    #[error("schema artifact {} belongs to '{found}', not '{chunk}'", path.display())]
    SchemaMismatch { chunk: String, found: String, path: PathBuf },

    /// Two chunk files map to the same output names.
    #[error("chunk id '{id}' is shared by '{first}' and '{second}'")]
    DuplicateChunkId { id: String, first: String, second: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An error index points past the end of the file it was recorded against.
    #[error("line index {index} out of range for {} ({len} lines)", path.display())]
    IndexOutOfRange { path: PathBuf, index: usize, len: usize },
}

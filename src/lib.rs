mod config;
mod error;
mod paths;
mod util;
mod progress;
mod concurrency;
mod textfile;
mod chunk_io;

mod schema;
mod patterns;
mod detect;
mod parse;
mod pipeline;

mod cleanup;
mod recovery;
mod freqs;
mod rearchive;
mod integrity;
mod unique;
mod pseudo;

pub use crate::config::{
    IndexRange, PipelineOptions, DEFAULT_DELIMITER_CANDIDATES, DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_NUM_LINES,
};
pub use crate::error::PipelineError;
pub use crate::pipeline::{parse_chunk, read_schema_artifact, ChunkParseStats, ComboETL, ERROR_INDICES_FILE, RECORDS_FILE};

// Core model and heuristics, usable without the directory-level stages.
pub use crate::schema::{Delimiter, Placement, Schema, SchemaArtifact};
pub use crate::patterns::{delimiter_class, middle_pattern, DetectionPatterns, EMAIL_SHAPE};
pub use crate::detect::{mode, schema_from_votes, LineVote, SchemaDetector};
pub use crate::parse::{LineParser, ParseFailure, ParseOutcome};

// Chunk naming and reading.
pub use crate::paths::{artifact_stem_of, chunk_id_of, discover_chunks, ChunkJob};
pub use crate::chunk_io::{
    for_each_line, for_each_normalized_line, normalize_line, read_sample, ChunkFormat, ChunkReader,
};

// Supplementary stages' result types.
pub use crate::cleanup::{is_valid_row, ChunkCleanupStats};
pub use crate::recovery::{pick_chunk_lines, RecoveredLines};
pub use crate::freqs::{ChunkFreqStats, FreqMergeStats, FreqTable, EMAIL_FREQS_DIR, POH_FREQS_DIR};
pub use crate::unique::ChunkUniqueStats;
pub use crate::pseudo::{PseudoComboOptions, MAX_LOCAL_PART_LENGTH};

// Process-level helpers for binaries.
pub use crate::util::{init_tracing_once, init_tracing_with};

use crate::error::PipelineError;
use anyhow::Result;

pub const DEFAULT_DELIMITER_CANDIDATES: &str = ":;|, \t";
pub const DEFAULT_MAX_NUM_LINES: usize = 10_000_000;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 200;

/// Half-open `[start, end)` slice of a sorted chunk list. Missing ends mean
/// "from the beginning" / "to the end"; out-of-range ends are clamped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl IndexRange {
    pub fn new(start: Option<usize>, end: Option<usize>) -> Self {
        Self { start, end }
    }

    pub fn bounds(&self, len: usize) -> (usize, usize) {
        let end = self.end.unwrap_or(len).min(len);
        let start = self.start.unwrap_or(0).min(end);
        (start, end)
    }

    pub fn select<T>(&self, items: Vec<T>) -> Vec<T> {
        let (start, end) = self.bounds(items.len());
        items.into_iter().skip(start).take(end - start).collect()
    }
}

/// Run configuration, built once and owned by the pipeline value.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub delimiter_candidates: String,
    pub max_num_lines: usize,   // detection sample cap per chunk
    pub max_line_length: usize, // characters kept per line before matching
    pub range: IndexRange,
    pub file_concurrency: usize, // cleanup / frequency stages only
    pub progress: bool,
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            delimiter_candidates: DEFAULT_DELIMITER_CANDIDATES.to_string(),
            max_num_lines: DEFAULT_MAX_NUM_LINES,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            range: IndexRange::default(),
            file_concurrency: 1,
            progress: true,
            progress_label: None,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl PipelineOptions {
    pub fn with_delimiter_candidates(mut self, chars: impl Into<String>) -> Self {
        self.delimiter_candidates = chars.into();
        self
    }
    pub fn with_max_num_lines(mut self, n: usize) -> Self {
        self.max_num_lines = n;
        self
    }
    pub fn with_max_line_length(mut self, n: usize) -> Self {
        self.max_line_length = n;
        self
    }
    pub fn with_index_range(mut self, start: Option<usize>, end: Option<usize>) -> Self {
        self.range = IndexRange::new(start, end);
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    /// Reject settings no stage can run with.
    pub fn validate(&self) -> Result<()> {
        if self.delimiter_candidates.is_empty() {
            return Err(PipelineError::InvalidConfig("delimiter_candidates must not be empty".into()).into());
        }
        if self.max_line_length == 0 {
            return Err(PipelineError::InvalidConfig("max_line_length must be at least 1".into()).into());
        }
        Ok(())
    }
}

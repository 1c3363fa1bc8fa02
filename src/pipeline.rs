//! Pipeline facade: a builder carrying `PipelineOptions` plus the two core stages,
//! schema detection and parsing. Supplementary stages live in their own modules
//! as further `impl ComboETL` blocks.

use crate::chunk_io::{for_each_normalized_line, read_sample};
use crate::config::PipelineOptions;
use crate::detect::SchemaDetector;
use crate::error::PipelineError;
use crate::parse::{LineParser, ParseOutcome};
use crate::paths::{discover_chunks, schema_artifact_path, ChunkJob};
use crate::progress::stage_progress;
use crate::schema::{Schema, SchemaArtifact};
use crate::textfile::AtomicTextWriter;
use crate::util::{init_tracing_once, open_with_backoff};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::BufReader;
use std::path::Path;

pub const RECORDS_FILE: &str = "records.tsv";
pub const ERROR_INDICES_FILE: &str = "error_indices.txt";

#[derive(Clone, Default)]
pub struct ComboETL {
    pub(crate) opts: PipelineOptions,
}

/// Outcome of parsing one chunk. `records + errors == lines` always holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChunkParseStats {
    pub chunk: String,
    pub lines: usize,
    pub records: usize,
    pub errors: usize,
}

impl ComboETL {
    pub fn new() -> Self {
        Self { opts: PipelineOptions::default() }
    }

    pub fn with_options(opts: PipelineOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn delimiter_candidates(mut self, chars: impl Into<String>) -> Self { self.opts = self.opts.with_delimiter_candidates(chars); self }
    pub fn max_num_lines(mut self, n: usize) -> Self { self.opts = self.opts.with_max_num_lines(n); self }
    pub fn max_line_length(mut self, n: usize) -> Self { self.opts = self.opts.with_max_line_length(n); self }
    pub fn index_range(mut self, start: Option<usize>, end: Option<usize>) -> Self { self.opts = self.opts.with_index_range(start, end); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    // -------- Schema detection --------

    /// Infer a schema for every selected chunk of `input_dir` and write one
    /// `<artifact stem>.json` per chunk into `log_dir`.
    /// Stops at the first fatal chunk error; earlier chunks keep their artifacts.
    pub fn detect_schema(&self, input_dir: &Path, log_dir: &Path) -> Result<Vec<SchemaArtifact>> {
        init_tracing_once();
        self.opts.validate()?;
        let detector = SchemaDetector::new(&self.opts.delimiter_candidates)?;

        let jobs = discover_chunks(input_dir, self.opts.range)?;
        fs::create_dir_all(log_dir).with_context(|| format!("create {}", log_dir.display()))?;

        tracing::info!("Starting schema detection over {} chunks", jobs.len());
        let pb = stage_progress(&self.opts, jobs.len(), "Detect schema");

        let mut out = Vec::with_capacity(jobs.len());
        for job in &jobs {
            tracing::info!("Processing '{}'", job.file_name);
            let artifact = self
                .detect_job(job, &detector, log_dir)
                .with_context(|| format!("schema detection failed at chunk #{} ({})", job.index, job.path.display()))?;
            tracing::debug!(
                chunk = %job.file_name,
                placement = %artifact.schema.placement,
                delimiter = ?artifact.schema.delimiter,
                "schema detected"
            );
            out.push(artifact);
            if let Some(pb) = &pb { pb.inc(1); }
        }

        if let Some(pb) = pb { pb.finish_with_message("Detect schema: done"); }
        tracing::info!("Finished schema detection");
        Ok(out)
    }

    fn detect_job(&self, job: &ChunkJob, detector: &SchemaDetector, log_dir: &Path) -> Result<SchemaArtifact> {
        let lines = read_sample(
            &job.path,
            self.opts.read_buffer_bytes,
            self.opts.max_num_lines,
            self.opts.max_line_length,
        )?;
        let schema = detector.detect(&lines);
        let artifact = SchemaArtifact { filename: job.file_name.clone(), schema };
        write_schema_artifact(&schema_artifact_path(log_dir, job), &artifact)?;
        Ok(artifact)
    }

    // -------- Parsing --------

    /// Parse every selected chunk of `input_dir` with the schema the detector left in
    /// `schema_dir`, writing `<output_root>/<chunk id>/{records.tsv,error_indices.txt}`.
    pub fn parse(&self, input_dir: &Path, schema_dir: &Path, output_root: &Path) -> Result<Vec<ChunkParseStats>> {
        init_tracing_once();
        self.opts.validate()?;

        let jobs = discover_chunks(input_dir, self.opts.range)?;
        fs::create_dir_all(output_root).with_context(|| format!("create {}", output_root.display()))?;

        tracing::info!("Start parsing {} chunks", jobs.len());
        let pb = stage_progress(&self.opts, jobs.len(), "Parse");

        let mut out = Vec::with_capacity(jobs.len());
        for job in &jobs {
            tracing::info!("Processing '{}'", job.file_name);
            let stats = self
                .parse_job(job, schema_dir, output_root)
                .with_context(|| format!("parsing failed at chunk #{} ({})", job.index, job.path.display()))?;
            if stats.errors > 0 {
                tracing::debug!(chunk = %stats.chunk, errors = stats.errors, lines = stats.lines, "parse errors recorded");
            }
            out.push(stats);
            if let Some(pb) = &pb { pb.inc(1); }
        }

        if let Some(pb) = pb { pb.finish_with_message("Parse: done"); }
        let (records, errors) = out.iter().fold((0usize, 0usize), |(r, e), s| (r + s.records, e + s.errors));
        tracing::info!("Finished parsing: {} records, {} error lines", records, errors);
        Ok(out)
    }

    fn parse_job(&self, job: &ChunkJob, schema_dir: &Path, output_root: &Path) -> Result<ChunkParseStats> {
        let artifact_path = schema_artifact_path(schema_dir, job);
        let artifact = read_schema_artifact(&artifact_path, job)?;
        if artifact.filename != job.file_name {
            return Err(PipelineError::SchemaMismatch {
                chunk: job.file_name.clone(),
                found: artifact.filename,
                path: artifact_path,
            }
            .into());
        }

        let out_dir = output_root.join(job.chunk_id());
        fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;

        parse_chunk(
            &job.path,
            &artifact.schema,
            &out_dir,
            self.opts.max_line_length,
            self.opts.read_buffer_bytes,
            self.opts.write_buffer_bytes,
        )
        .map(|mut stats| {
            stats.chunk = job.chunk_id().to_string();
            stats
        })
    }
}

/// Parse one chunk into `out_dir`. Both artifacts are committed only after the
/// whole chunk was read, so a partial run leaves no final-named output behind.
pub fn parse_chunk(
    chunk: &Path,
    schema: &Schema,
    out_dir: &Path,
    max_line_length: usize,
    read_buf_bytes: usize,
    write_buf_bytes: usize,
) -> Result<ChunkParseStats> {
    let parser = LineParser::new(schema)?;
    let mut records = AtomicTextWriter::create(&out_dir.join(RECORDS_FILE), write_buf_bytes)?;
    let mut errors = AtomicTextWriter::create(&out_dir.join(ERROR_INDICES_FILE), write_buf_bytes)?;

    let mut stats = ChunkParseStats::default();
    let lines = for_each_normalized_line(chunk, read_buf_bytes, max_line_length, |idx, line| {
        match parser.parse(line) {
            ParseOutcome::Parsed { email, poh } => {
                records.write_pair(&email, &poh)?;
                stats.records += 1;
            }
            ParseOutcome::Failed(_) => {
                errors.write_line(&idx.to_string())?;
                stats.errors += 1;
            }
        }
        Ok(())
    })?;
    stats.lines = lines;

    records.commit()?;
    errors.commit()?;
    Ok(stats)
}

fn write_schema_artifact(path: &Path, artifact: &SchemaArtifact) -> Result<()> {
    let mut w = AtomicTextWriter::create(path, 8 * 1024)?;
    let json = serde_json::to_string(artifact)?;
    w.write_line(&json)?;
    w.commit()
}

/// Load the schema the detector wrote for `job`. Absence is fatal: no default is assumed.
pub fn read_schema_artifact(path: &Path, job: &ChunkJob) -> Result<SchemaArtifact> {
    if !path.is_file() {
        return Err(PipelineError::MissingSchema { chunk: job.file_name.clone(), path: path.to_path_buf() }.into());
    }
    let f = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| format!("read schema artifact {}", path.display()))
}

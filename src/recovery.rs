//! Audit helpers: turn error-index lists back into the offending lines.

use crate::chunk_io::for_each_line;
use crate::error::PipelineError;
use crate::paths::{discover_chunk_dirs, find_chunk_by_id, ChunkDir};
use crate::pipeline::{ComboETL, ERROR_INDICES_FILE, RECORDS_FILE};
use crate::progress::stage_progress;
use crate::textfile::{read_all_lines, read_indices, AtomicTextWriter};
use crate::util::init_tracing_once;
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Lines recovered for one chunk directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredLines {
    pub chunk: String,
    pub output: PathBuf,
    pub lines: usize,
}

impl ComboETL {
    /// For every parse output directory, re-open the archived chunk with the same chunk
    /// id and write the raw lines listed in its `error_indices.txt` to `<out_dir>/<id>.txt`.
    pub fn collect_parsing_errors(&self, archive_dir: &Path, parse_root: &Path, out_dir: &Path) -> Result<Vec<RecoveredLines>> {
        init_tracing_once();
        let read_buf = self.opts.read_buffer_bytes;
        self.collect_errors(parse_root, out_dir, "Collect parsing errors", |dir, indices| {
            let chunk = find_chunk_by_id(archive_dir, &dir.id)?;
            pick_chunk_lines(&chunk, indices, read_buf)
        })
    }

    /// For every cleanup output directory, pick the rejected rows out of the matching
    /// parse directory's `records.tsv`.
    pub fn collect_cleanup_errors(&self, parse_root: &Path, cleanup_root: &Path, out_dir: &Path) -> Result<Vec<RecoveredLines>> {
        init_tracing_once();
        let read_buf = self.opts.read_buffer_bytes;
        self.collect_errors(cleanup_root, out_dir, "Collect cleanup errors", |dir, indices| {
            let records = parse_root.join(&dir.id).join(RECORDS_FILE);
            let rows = read_all_lines(&records, read_buf)?;
            indices
                .iter()
                .map(|&i| {
                    rows.get(i).cloned().ok_or_else(|| {
                        anyhow::Error::from(PipelineError::IndexOutOfRange { path: records.clone(), index: i, len: rows.len() })
                    })
                })
                .collect()
        })
    }

    fn collect_errors(
        &self,
        indices_root: &Path,
        out_dir: &Path,
        label: &str,
        mut pick: impl FnMut(&ChunkDir, &[usize]) -> Result<Vec<String>>,
    ) -> Result<Vec<RecoveredLines>> {
        let dirs = discover_chunk_dirs(indices_root, self.opts.range)?;
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

        tracing::info!("{}: {} chunk directories", label, dirs.len());
        let pb = stage_progress(&self.opts, dirs.len(), label);

        let mut out = Vec::with_capacity(dirs.len());
        for dir in &dirs {
            let indices = read_indices(&dir.path.join(ERROR_INDICES_FILE), self.opts.read_buffer_bytes)?;
            let lines = pick(dir, &indices).with_context(|| format!("{label} failed at {}", dir.path.display()))?;

            let output = out_dir.join(format!("{}.txt", dir.id));
            let mut w = AtomicTextWriter::create(&output, self.opts.write_buffer_bytes)?;
            for line in &lines {
                w.write_line(line)?;
            }
            w.commit()?;

            out.push(RecoveredLines { chunk: dir.id.clone(), output, lines: lines.len() });
            if let Some(pb) = &pb { pb.inc(1); }
        }

        if let Some(pb) = pb { pb.finish_with_message(format!("{label}: done")); }
        tracing::info!("{}: recovered {} lines", label, out.iter().map(|r| r.lines).sum::<usize>());
        Ok(out)
    }
}

/// Raw (decoded, untrimmed) lines of `chunk` at `indices`, in the order given.
pub fn pick_chunk_lines(chunk: &Path, indices: &[usize], read_buf: usize) -> Result<Vec<String>> {
    let wanted: AHashSet<usize> = indices.iter().copied().collect();
    let mut found: AHashMap<usize, String> = AHashMap::with_capacity(wanted.len());
    let total = for_each_line(chunk, read_buf, |idx, raw| {
        if wanted.contains(&idx) {
            found.insert(idx, raw.to_string());
        }
        Ok(())
    })?;

    indices
        .iter()
        .map(|i| {
            found.get(i).cloned().ok_or_else(|| {
                anyhow::Error::from(PipelineError::IndexOutOfRange { path: chunk.to_path_buf(), index: *i, len: total })
            })
        })
        .collect()
}

//! Structural cleanup of parsed records: keep rows with exactly two tab-separated
//! fields, and record the indices of the rest.

use crate::concurrency::for_each_limited;
use crate::paths::{discover_chunk_dirs, ChunkDir};
use crate::pipeline::{ComboETL, ERROR_INDICES_FILE, RECORDS_FILE};
use crate::progress::stage_progress;
use crate::textfile::{AtomicTextWriter, TextReader};
use crate::util::init_tracing_once;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChunkCleanupStats {
    pub chunk: String,
    pub kept: usize,
    pub rejected: usize,
}

/// A well-formed row splits into exactly two fields on `\t`.
pub fn is_valid_row(row: &str) -> bool {
    row.split('\t').count() == 2
}

impl ComboETL {
    /// Clean every selected chunk directory of `parse_root` into `cleanup_root`.
    /// Returns per-chunk stats in chunk order.
    pub fn cleanup(&self, parse_root: &Path, cleanup_root: &Path) -> Result<Vec<ChunkCleanupStats>> {
        init_tracing_once();
        let dirs = discover_chunk_dirs(parse_root, self.opts.range)?;
        fs::create_dir_all(cleanup_root).with_context(|| format!("create {}", cleanup_root.display()))?;

        tracing::info!("Start cleaning up {} chunk directories", dirs.len());
        let pb = stage_progress(&self.opts, dirs.len(), "Cleanup");
        let results = Mutex::new(Vec::with_capacity(dirs.len()));

        for_each_limited(&dirs, self.opts.file_concurrency, |dir| {
            let stats = cleanup_dir(dir, cleanup_root, self.opts.read_buffer_bytes, self.opts.write_buffer_bytes)
                .with_context(|| format!("cleanup failed at #{} ({})", dir.index, dir.path.display()))?;
            results.lock().map_err(|_| anyhow!("cleanup results lock poisoned"))?.push((dir.index, stats));
            if let Some(pb) = &pb { pb.inc(1); }
            Ok(())
        })?;

        if let Some(pb) = pb { pb.finish_with_message("Cleanup: done"); }
        let mut results = results.into_inner().map_err(|_| anyhow!("cleanup results lock poisoned"))?;
        results.sort_by_key(|(i, _)| *i);
        tracing::info!("Finished cleaning up the files");
        Ok(results.into_iter().map(|(_, s)| s).collect())
    }
}

fn cleanup_dir(dir: &ChunkDir, cleanup_root: &Path, read_buf: usize, write_buf: usize) -> Result<ChunkCleanupStats> {
    let input = dir.path.join(RECORDS_FILE);
    let out_dir = cleanup_root.join(&dir.id);
    fs::create_dir_all(&out_dir)?;

    let mut rdr = TextReader::open(&input, read_buf).with_context(|| format!("open {}", input.display()))?;
    let mut records = AtomicTextWriter::create(&out_dir.join(RECORDS_FILE), write_buf)?;
    let mut errors = AtomicTextWriter::create(&out_dir.join(ERROR_INDICES_FILE), write_buf)?;

    let mut stats = ChunkCleanupStats { chunk: dir.id.clone(), ..Default::default() };
    let mut buf = String::new();
    let mut idx = 0usize;
    while rdr.read_line(&mut buf)? > 0 {
        // no trimming: a trailing tab is the separator of an empty poh
        let row = buf.as_str();
        if is_valid_row(row) {
            records.write_line(row)?;
            stats.kept += 1;
        } else {
            errors.write_line(&idx.to_string())?;
            stats.rejected += 1;
        }
        idx += 1;
    }

    records.commit()?;
    errors.commit()?;
    Ok(stats)
}

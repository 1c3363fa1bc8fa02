//! Per-chunk deduplication: each `*.txt.gz` chunk is rewritten with its trimmed lines
//! sorted and made unique. Chunks are independent, so duplicates across chunks survive.

use crate::chunk_io::for_each_line;
use crate::concurrency::for_each_limited;
use crate::paths::{discover_chunks_matching, ChunkJob};
use crate::pipeline::ComboETL;
use crate::progress::stage_progress;
use crate::textfile::AtomicGzWriter;
use crate::util::init_tracing_once;
use ahash::AHashSet;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChunkUniqueStats {
    pub chunk: String,
    pub lines: usize,
    pub unique: usize,
}

impl ComboETL {
    /// Write `<out_dir>/<name>` for every selected `*.txt.gz` chunk of `input_dir`,
    /// holding the chunk's distinct trimmed lines in byte order.
    pub fn make_unique(&self, input_dir: &Path, out_dir: &Path) -> Result<Vec<ChunkUniqueStats>> {
        init_tracing_once();
        let jobs = discover_chunks_matching(input_dir, self.opts.range, |n| n.ends_with(".txt.gz"))?;
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

        tracing::info!("Starting to drop duplicates and sort {} chunks", jobs.len());
        let pb = stage_progress(&self.opts, jobs.len(), "Make unique");
        let results = Mutex::new(Vec::with_capacity(jobs.len()));

        for_each_limited(&jobs, self.opts.file_concurrency, |job| {
            tracing::info!("Processing '{}'", job.file_name);
            let stats = unique_chunk(job, out_dir, self.opts.read_buffer_bytes, self.opts.write_buffer_bytes)
                .with_context(|| format!("make-unique failed at #{} ({})", job.index, job.path.display()))?;
            results.lock().map_err(|_| anyhow!("make-unique results lock poisoned"))?.push((job.index, stats));
            if let Some(pb) = &pb { pb.inc(1); }
            Ok(())
        })?;

        if let Some(pb) = pb { pb.finish_with_message("Make unique: done"); }
        let mut results = results.into_inner().map_err(|_| anyhow!("make-unique results lock poisoned"))?;
        results.sort_by_key(|(i, _)| *i);
        let (lines, unique) = results.iter().fold((0, 0), |(l, u), (_, s)| (l + s.lines, u + s.unique));
        tracing::info!("Finished dropping duplicates: {} of {} lines kept", unique, lines);
        Ok(results.into_iter().map(|(_, s)| s).collect())
    }
}

fn unique_chunk(job: &ChunkJob, out_dir: &Path, read_buf: usize, write_buf: usize) -> Result<ChunkUniqueStats> {
    let mut seen: AHashSet<String> = AHashSet::new();
    let lines = for_each_line(&job.path, read_buf, |_, line| {
        let line = line.trim();
        if !seen.contains(line) {
            seen.insert(line.to_string());
        }
        Ok(())
    })?;

    let mut sorted: Vec<String> = seen.into_iter().collect();
    sorted.sort_unstable();

    let mut w = AtomicGzWriter::create(&out_dir.join(&job.file_name), write_buf)?;
    for line in &sorted {
        w.write_line(line)?;
    }
    w.commit()?;

    Ok(ChunkUniqueStats { chunk: job.chunk_id().to_string(), lines, unique: sorted.len() })
}

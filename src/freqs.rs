//! Value-frequency tables for the `email` and `poh` columns: per-chunk counting and
//! merge-by-sum across shards. Tables are `value\tfreq` TSV, most frequent first.

use crate::concurrency::for_each_limited;
use crate::config::IndexRange;
use crate::paths::{discover_chunk_dirs, discover_chunks_matching, ChunkDir};
use crate::pipeline::{ComboETL, RECORDS_FILE};
use crate::progress::stage_progress;
use crate::textfile::{AtomicTextWriter, TextReader};
use crate::util::init_tracing_once;
use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const EMAIL_FREQS_DIR: &str = "email";
pub const POH_FREQS_DIR: &str = "poh";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreqTable {
    counts: AHashMap<String, u64>,
}

impl FreqTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, value: &str, n: u64) {
        match self.counts.get_mut(value) {
            Some(c) => *c += n,
            None => {
                self.counts.insert(value.to_string(), n);
            }
        }
    }

    pub fn merge(&mut self, other: FreqTable) {
        for (k, v) in other.counts {
            *self.counts.entry(k).or_insert(0) += v;
        }
    }

    pub fn get(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Descending frequency, ties by value, so output is deterministic.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut v: Vec<(&str, u64)> = self.counts.iter().map(|(k, c)| (k.as_str(), *c)).collect();
        v.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        v
    }

    pub fn write_tsv(&self, path: &Path, write_buf: usize) -> Result<()> {
        let mut w = AtomicTextWriter::create(path, write_buf)?;
        for (value, freq) in self.sorted() {
            w.write_pair(value, &freq.to_string())?;
        }
        w.commit()
    }

    /// Load a table, summing repeated values. Returns the table and the number of
    /// rows skipped as malformed.
    pub fn read_tsv(path: &Path, read_buf: usize) -> Result<(Self, usize)> {
        let mut rdr = TextReader::open(path, read_buf).with_context(|| format!("open {}", path.display()))?;
        let mut table = FreqTable::new();
        let mut malformed = 0usize;
        let mut buf = String::new();
        while rdr.read_line(&mut buf)? > 0 {
            match buf.rsplit_once('\t').and_then(|(v, f)| f.trim().parse::<u64>().ok().map(|f| (v, f))) {
                Some((value, freq)) => table.add(value, freq),
                None => malformed += 1,
            }
        }
        Ok((table, malformed))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChunkFreqStats {
    pub chunk: String,
    pub rows: usize,
    pub skipped: usize,
    pub distinct_emails: usize,
    pub distinct_pohs: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FreqMergeStats {
    pub inputs: usize,
    pub distinct: usize,
    pub total: u64,
    pub malformed_rows: usize,
}

impl ComboETL {
    /// Count `email` and `poh` frequencies of each selected chunk directory's
    /// `records.tsv` into `<out_root>/email/<id>.tsv` and `<out_root>/poh/<id>.tsv`.
    pub fn count_freqs(&self, records_root: &Path, out_root: &Path) -> Result<Vec<ChunkFreqStats>> {
        init_tracing_once();
        let dirs = discover_chunk_dirs(records_root, self.opts.range)?;
        let email_dir = out_root.join(EMAIL_FREQS_DIR);
        let poh_dir = out_root.join(POH_FREQS_DIR);
        fs::create_dir_all(&email_dir).with_context(|| format!("create {}", email_dir.display()))?;
        fs::create_dir_all(&poh_dir).with_context(|| format!("create {}", poh_dir.display()))?;

        tracing::info!("Start counting local frequencies over {} chunk directories", dirs.len());
        let pb = stage_progress(&self.opts, dirs.len(), "Count frequencies");
        let (read_buf, write_buf) = (self.opts.read_buffer_bytes, self.opts.write_buffer_bytes);
        let results = Mutex::new(Vec::with_capacity(dirs.len()));

        for_each_limited(&dirs, self.opts.file_concurrency, |dir| {
            let stats = count_dir(dir, &email_dir, &poh_dir, read_buf, write_buf)
                .with_context(|| format!("frequency count failed at #{} ({})", dir.index, dir.path.display()))?;
            results.lock().map_err(|_| anyhow!("frequency results lock poisoned"))?.push((dir.index, stats));
            if let Some(pb) = &pb { pb.inc(1); }
            Ok(())
        })?;

        if let Some(pb) = pb { pb.finish_with_message("Count frequencies: done"); }
        let mut results = results.into_inner().map_err(|_| anyhow!("frequency results lock poisoned"))?;
        results.sort_by_key(|(i, _)| *i);
        tracing::info!("Finished counting local frequencies");
        Ok(results.into_iter().map(|(_, s)| s).collect())
    }

    /// Sum every `*.tsv` frequency table in `freq_dir` into `out_path`.
    pub fn merge_freqs(&self, freq_dir: &Path, out_path: &Path) -> Result<FreqMergeStats> {
        init_tracing_once();
        let inputs: Vec<PathBuf> = discover_chunks_matching(freq_dir, IndexRange::default(), |n| n.ends_with(".tsv"))?
            .into_iter()
            .map(|j| j.path)
            .collect();

        tracing::info!("Start merging {} frequency tables", inputs.len());
        let pb = stage_progress(&self.opts, inputs.len(), "Merge frequencies");

        let mut total = FreqTable::new();
        let mut malformed_rows = 0usize;
        for input in &inputs {
            let (part, bad) = FreqTable::read_tsv(input, self.opts.read_buffer_bytes)?;
            total.merge(part);
            malformed_rows += bad;
            if let Some(pb) = &pb { pb.inc(1); }
        }
        if malformed_rows > 0 {
            tracing::warn!("skipped {} malformed frequency rows", malformed_rows);
        }

        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        total.write_tsv(out_path, self.opts.write_buffer_bytes)?;

        if let Some(pb) = pb { pb.finish_with_message("Merge frequencies: done"); }
        let stats = FreqMergeStats { inputs: inputs.len(), distinct: total.len(), total: total.total(), malformed_rows };
        tracing::info!("Finished merging frequencies: {} distinct values", stats.distinct);
        Ok(stats)
    }
}

fn count_dir(dir: &ChunkDir, email_dir: &Path, poh_dir: &Path, read_buf: usize, write_buf: usize) -> Result<ChunkFreqStats> {
    let input = dir.path.join(RECORDS_FILE);
    let mut rdr = TextReader::open(&input, read_buf).with_context(|| format!("open {}", input.display()))?;

    let mut emails = FreqTable::new();
    let mut pohs = FreqTable::new();
    let mut rows = 0usize;
    let mut skipped = 0usize;
    let mut buf = String::new();
    while rdr.read_line(&mut buf)? > 0 {
        match buf.split_once('\t') {
            Some((email, poh)) if !poh.contains('\t') => {
                emails.add(email, 1);
                pohs.add(poh, 1);
                rows += 1;
            }
            _ => skipped += 1,
        }
    }

    let file_name = format!("{}.tsv", dir.id);
    emails.write_tsv(&email_dir.join(&file_name), write_buf)?;
    pohs.write_tsv(&poh_dir.join(&file_name), write_buf)?;

    Ok(ChunkFreqStats {
        chunk: dir.id.clone(),
        rows,
        skipped,
        distinct_emails: emails.len(),
        distinct_pohs: pohs.len(),
    })
}

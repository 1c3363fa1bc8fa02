//! Synthetic combo lists for exercising the pipeline: numeric local parts at random
//! domains, paired with passwords drawn from a word list.

use crate::chunk_io::ChunkReader;
use crate::error::PipelineError;
use crate::pipeline::ComboETL;
use crate::progress::stage_progress;
use crate::textfile::AtomicTextWriter;
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

/// Widest local part whose `10^n` upper bound still fits in a `u64`.
pub const MAX_LOCAL_PART_LENGTH: usize = 19;

#[derive(Clone, Debug)]
pub struct PseudoComboOptions {
    /// `.txt`, `.gz` or `.zst` file, one word per line.
    pub word_list: PathBuf,
    /// Load at most this many words; 0 loads all.
    pub limit_num_words: usize,
    pub email_domains: Vec<String>,
    /// Digits in the local part, zero-padded.
    pub email_local_part_length: usize,
    pub delimiter: String,
    pub num_combos: usize,
    /// Fixed seed for reproducible output; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for PseudoComboOptions {
    fn default() -> Self {
        Self {
            word_list: PathBuf::new(),
            limit_num_words: 0,
            email_domains: vec!["example.com".to_string()],
            email_local_part_length: 8,
            delimiter: ":".to_string(),
            num_combos: 1000,
            seed: None,
        }
    }
}

impl PseudoComboOptions {
    fn validate(&self) -> Result<()> {
        if self.email_domains.iter().all(|d| d.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig("at least one email domain is required".into()).into());
        }
        if !(1..=MAX_LOCAL_PART_LENGTH).contains(&self.email_local_part_length) {
            return Err(PipelineError::InvalidConfig(format!(
                "email_local_part_length must be within 1..={MAX_LOCAL_PART_LENGTH}"
            ))
            .into());
        }
        Ok(())
    }
}

impl ComboETL {
    /// Write `num_combos` lines of `<local part>@<domain><delimiter><word>` to `out_path`.
    /// Returns the number of words loaded.
    pub fn generate_pseudo_combos(&self, opts: &PseudoComboOptions, out_path: &Path) -> Result<usize> {
        init_tracing_once();
        opts.validate()?;

        tracing::info!("Loading word list...");
        let words = load_words(&opts.word_list, opts.limit_num_words, self.opts.read_buffer_bytes)?;
        if words.is_empty() {
            return Err(PipelineError::InvalidConfig(format!("word list {} is empty", opts.word_list.display())).into());
        }
        let domains: Vec<&str> = opts.email_domains.iter().map(|d| d.trim()).filter(|d| !d.is_empty()).collect();

        let mut rng = match opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let width = opts.email_local_part_length;
        let upper = 10u64.checked_pow(width as u32).unwrap_or(u64::MAX);

        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut w = AtomicTextWriter::create(out_path, self.opts.write_buffer_bytes)?;

        tracing::info!("Start generating {} combos from {} words", opts.num_combos, words.len());
        let pb = stage_progress(&self.opts, opts.num_combos, "Generate combos");
        for _ in 0..opts.num_combos {
            let local = rng.random_range(0..upper);
            let (Some(domain), Some(word)) = (domains.choose(&mut rng), words.choose(&mut rng)) else {
                break;
            };
            w.write_line(&format!("{local:0width$}@{domain}{}{word}", opts.delimiter))?;
            if let Some(pb) = &pb { pb.inc(1); }
        }
        w.commit()?;

        if let Some(pb) = pb { pb.finish_with_message("Generate combos: done"); }
        tracing::info!("Finished generating combos into {}", out_path.display());
        Ok(words.len())
    }
}

fn load_words(path: &Path, limit: usize, read_buf: usize) -> Result<Vec<String>> {
    let mut rdr = ChunkReader::open(path, read_buf).with_context(|| format!("open word list {}", path.display()))?;
    let mut words = Vec::new();
    let mut buf = String::new();
    while rdr.read_line(&mut buf)? > 0 {
        words.push(buf.trim().to_string());
        if limit > 0 && words.len() >= limit {
            break;
        }
    }
    Ok(words)
}

//! Chunk discovery and the identity rules that tie a chunk to its artifacts.
//!
//! Both sides of every stage boundary derive names through these helpers:
//! `0001.txt.gz` has artifact stem `0001.txt` (schema artifact `0001.txt.json`)
//! and chunk id `0001` (parse output directory `<root>/0001`).

use crate::config::IndexRange;
use crate::error::PipelineError;
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One input chunk in sorted order. `index` is its position in the full sorted list,
/// which is what a caller passes back as `start_index` to resume.
#[derive(Clone, Debug)]
pub struct ChunkJob {
    pub index: usize,
    pub path: PathBuf,
    pub file_name: String,
}

impl ChunkJob {
    pub fn artifact_stem(&self) -> &str {
        artifact_stem_of(&self.file_name)
    }
    pub fn chunk_id(&self) -> &str {
        chunk_id_of(&self.file_name)
    }
}

/// File name without its last extension.
pub fn artifact_stem_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(i) if i > 0 => &file_name[..i],
        _ => file_name,
    }
}

/// File name up to its first `.`.
pub fn chunk_id_of(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

pub fn schema_artifact_path(log_dir: &Path, job: &ChunkJob) -> PathBuf {
    log_dir.join(format!("{}.json", job.artifact_stem()))
}

fn list_dir(dir: &Path, want_dirs: bool) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        bail!("input directory does not exist: {}", dir.display());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let ent = entry.with_context(|| format!("list {}", dir.display()))?;
        let is_dir = ent.file_type().is_dir();
        if is_dir != want_dirs || (!want_dirs && !ent.file_type().is_file()) {
            continue;
        }
        let Some(name) = ent.file_name().to_str() else {
            tracing::warn!("skipping non-UTF-8 name under {}", dir.display());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        out.push((name.to_string(), ent.path().to_path_buf()));
    }
    Ok(out)
}

/// All chunk files of `dir`, sorted by name, restricted to `range`.
/// Container support is checked when a chunk is opened, not here. Chunk ids must be
/// distinct across the whole listing, not just the selected range.
pub fn discover_chunks(dir: &Path, range: IndexRange) -> Result<Vec<ChunkJob>> {
    let all = list_chunks(dir, |_| true)?;
    ensure_distinct_ids(&all)?;
    Ok(range.select(all))
}

/// Like `discover_chunks`, keeping only names for which `keep` holds (before ranging).
pub fn discover_chunks_matching(
    dir: &Path,
    range: IndexRange,
    keep: impl Fn(&str) -> bool,
) -> Result<Vec<ChunkJob>> {
    Ok(range.select(list_chunks(dir, keep)?))
}

fn list_chunks(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<ChunkJob>> {
    let all: Vec<ChunkJob> = list_dir(dir, false)?
        .into_iter()
        .filter(|(name, _)| keep(name))
        .enumerate()
        .map(|(index, (file_name, path))| ChunkJob { index, path, file_name })
        .collect();
    tracing::info!("{} files exist in {}", all.len(), dir.display());
    Ok(all)
}

/// A chunk id is a prefix of the artifact stem, so distinct ids also mean
/// distinct schema artifacts.
fn ensure_distinct_ids(jobs: &[ChunkJob]) -> Result<()> {
    let mut seen: AHashMap<&str, &str> = AHashMap::with_capacity(jobs.len());
    for job in jobs {
        if let Some(first) = seen.insert(job.chunk_id(), &job.file_name) {
            return Err(PipelineError::DuplicateChunkId {
                id: job.chunk_id().to_string(),
                first: first.to_string(),
                second: job.file_name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// A per-chunk output directory of an earlier stage (named by chunk id).
#[derive(Clone, Debug)]
pub struct ChunkDir {
    pub index: usize,
    pub id: String,
    pub path: PathBuf,
}

pub fn discover_chunk_dirs(root: &Path, range: IndexRange) -> Result<Vec<ChunkDir>> {
    let all: Vec<ChunkDir> = list_dir(root, true)?
        .into_iter()
        .enumerate()
        .map(|(index, (id, path))| ChunkDir { index, id, path })
        .collect();
    tracing::info!("{} folders exist in {}", all.len(), root.display());
    Ok(range.select(all))
}

/// Locate the archived chunk whose chunk id is `id`. Exactly one match is required.
pub fn find_chunk_by_id(dir: &Path, id: &str) -> Result<PathBuf> {
    let mut hits = list_dir(dir, false)?
        .into_iter()
        .filter(|(name, _)| chunk_id_of(name) == id);
    match (hits.next(), hits.next()) {
        (Some((_, p)), None) => Ok(p),
        (None, _) => bail!("no chunk with id '{id}' under {}", dir.display()),
        (Some(_), Some(_)) => bail!("more than one chunk with id '{id}' under {}", dir.display()),
    }
}

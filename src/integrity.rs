use crate::chunk_io::validate_chunk_full;
use crate::paths::discover_chunks_matching;
use crate::pipeline::ComboETL;
use crate::progress::stage_progress;
use crate::util::init_tracing_once;
use anyhow::Result;
use std::path::{Path, PathBuf};

impl ComboETL {
    /// Decode every selected chunk of `input_dir` to EOF and return `(path, error_message)`
    /// for the ones that fail. Unsupported formats are reported here instead of aborting,
    /// and duplicate chunk ids are not checked, so one pass lists every decodable problem.
    pub fn check_chunk_integrity(&self, input_dir: &Path) -> Result<Vec<(PathBuf, String)>> {
        init_tracing_once();
        let jobs = discover_chunks_matching(input_dir, self.opts.range, |_| true)?;
        let pb = stage_progress(&self.opts, jobs.len(), "Integrity");

        let mut errors = Vec::new();
        for job in &jobs {
            if let Err(e) = validate_chunk_full(&job.path) {
                tracing::warn!("chunk #{} failed integrity check: {:#}", job.index, e);
                errors.push((job.path.clone(), format!("{e:#}")));
            }
            if let Some(pb) = &pb { pb.inc(1); }
        }

        if let Some(pb) = pb { pb.finish_with_message("done"); }
        tracing::info!("Integrity check: {} of {} chunks failed", errors.len(), jobs.len());
        Ok(errors)
    }
}

//! Re-archiving: gzip normalized `*.txt` chunks into `*.txt.gz` for the core stages.

use crate::chunk_io::for_each_line;
use crate::paths::discover_chunks_matching;
use crate::pipeline::ComboETL;
use crate::progress::stage_progress;
use crate::textfile::AtomicGzWriter;
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

impl ComboETL {
    /// gzip every selected `*.txt` file of `input_dir` into `<out_dir>/<name>.gz`.
    /// Lines are trimmed and re-terminated with `\n`. Returns the archives written.
    pub fn rearchive(&self, input_dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        init_tracing_once();
        let jobs = discover_chunks_matching(input_dir, self.opts.range, |n| n.ends_with(".txt"))?;
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

        tracing::info!("Start rearchiving {} files", jobs.len());
        let pb = stage_progress(&self.opts, jobs.len(), "Rearchive");

        let mut out = Vec::with_capacity(jobs.len());
        for job in &jobs {
            tracing::info!("Creating archive of {}", job.file_name);
            let dest = out_dir.join(format!("{}.gz", job.file_name));
            gzip_lines(&job.path, &dest, self.opts.read_buffer_bytes, self.opts.write_buffer_bytes)
                .with_context(|| format!("rearchive failed at #{} ({})", job.index, job.path.display()))?;
            out.push(dest);
            if let Some(pb) = &pb { pb.inc(1); }
        }

        if let Some(pb) = pb { pb.finish_with_message("Rearchive: done"); }
        tracing::info!("Finished rearchiving the files");
        Ok(out)
    }
}

fn gzip_lines(src: &Path, dest: &Path, read_buf: usize, write_buf: usize) -> Result<()> {
    let mut w = AtomicGzWriter::create(dest, write_buf)?;
    for_each_line(src, read_buf, |_, line| Ok(w.write_line(line.trim())?))?;
    w.commit()
}

use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Buffered reader for the plain-text artifacts (TSV tables, index lists).
pub struct TextReader {
    rdr: BufReader<File>,
}

impl TextReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        Ok(Self { rdr: BufReader::with_capacity(buf_bytes.max(8 * 1024), f) })
    }

    /// Read the next line into `buf`, stripping `\r?\n`. Returns bytes read (0 on EOF).
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if n == 0 { return Ok(0); }
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }
}

/// Writer that fills `<dest>.part` and only moves it to `dest` on `commit`,
/// so an interrupted stage never leaves a truncated artifact under its final name.
pub struct AtomicTextWriter {
    tmp: PathBuf,
    dest: PathBuf,
    w: BufWriter<File>,
}

fn create_part(dest: &Path, buf_bytes: usize) -> Result<(PathBuf, BufWriter<File>)> {
    let mut name: OsString = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    let tmp = dest.with_file_name(name);
    let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
    Ok((tmp, BufWriter::with_capacity(buf_bytes.max(8 * 1024), f)))
}

impl AtomicTextWriter {
    pub fn create(dest: &Path, buf_bytes: usize) -> Result<Self> {
        let (tmp, w) = create_part(dest, buf_bytes)?;
        Ok(Self { tmp, dest: dest.to_path_buf(), w })
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        self.w.write_all(s.as_bytes())?;
        self.w.write_all(b"\n")
    }

    /// One `a\tb` row.
    #[inline]
    pub fn write_pair(&mut self, a: &str, b: &str) -> io::Result<()> {
        self.w.write_all(a.as_bytes())?;
        self.w.write_all(b"\t")?;
        self.w.write_all(b.as_bytes())?;
        self.w.write_all(b"\n")
    }

    pub fn commit(mut self) -> Result<()> {
        self.w.flush().with_context(|| format!("flush {}", self.tmp.display()))?;
        drop(self.w);
        replace_file_atomic_backoff(&self.tmp, &self.dest)
    }
}

/// gzip counterpart of `AtomicTextWriter`, for chunk-shaped outputs.
pub struct AtomicGzWriter {
    tmp: PathBuf,
    dest: PathBuf,
    enc: GzEncoder<BufWriter<File>>,
}

impl AtomicGzWriter {
    pub fn create(dest: &Path, buf_bytes: usize) -> Result<Self> {
        let (tmp, w) = create_part(dest, buf_bytes)?;
        Ok(Self { tmp, dest: dest.to_path_buf(), enc: GzEncoder::new(w, Compression::default()) })
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        self.enc.write_all(s.as_bytes())?;
        self.enc.write_all(b"\n")
    }

    pub fn commit(self) -> Result<()> {
        let mut w = self.enc.finish().with_context(|| format!("finish {}", self.tmp.display()))?;
        w.flush().with_context(|| format!("flush {}", self.tmp.display()))?;
        drop(w);
        replace_file_atomic_backoff(&self.tmp, &self.dest)
    }
}

/// Read every line of a text artifact.
pub fn read_all_lines(path: &Path, buf_bytes: usize) -> Result<Vec<String>> {
    let mut rdr = TextReader::open(path, buf_bytes).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    let mut buf = String::new();
    while rdr.read_line(&mut buf)? > 0 {
        out.push(buf.clone());
    }
    Ok(out)
}

/// Read a list of zero-based line indices, one per line. Blank lines are ignored.
pub fn read_indices(path: &Path, buf_bytes: usize) -> Result<Vec<usize>> {
    let mut rdr = TextReader::open(path, buf_bytes).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut line_no = 0usize;
    while rdr.read_line(&mut buf)? > 0 {
        line_no += 1;
        let s = buf.trim();
        if s.is_empty() { continue; }
        let idx = s
            .parse::<usize>()
            .with_context(|| format!("{}:{}: not a line index: {s:?}", path.display(), line_no))?;
        out.push(idx);
    }
    Ok(out)
}

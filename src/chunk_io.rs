use crate::error::PipelineError;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Container formats a chunk may arrive in, decided by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkFormat {
    Text, // .txt
    Gzip, // .gz
    Zstd, // .zst
}

impl ChunkFormat {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(ChunkFormat::Text),
            "gz" => Ok(ChunkFormat::Gzip),
            "zst" => Ok(ChunkFormat::Zstd),
            _ => Err(PipelineError::UnsupportedFormat { path: path.to_path_buf(), extension: ext }),
        }
    }
}

fn open_decoded(path: &Path) -> Result<Box<dyn Read>> {
    let format = ChunkFormat::from_path(path)?;
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    Ok(match format {
        ChunkFormat::Text => Box::new(file),
        ChunkFormat::Gzip => Box::new(MultiGzDecoder::new(file)),
        ChunkFormat::Zstd => {
            let mut dec = ZstdDecoder::new(file)?;
            dec.window_log_max(31)?;
            Box::new(dec)
        }
    })
}

/// Line reader over a (possibly compressed) chunk.
/// `\n`, `\r\n` and a lone `\r` all end a line. Invalid UTF-8 is replaced with
/// U+FFFD rather than failing the line.
pub struct ChunkReader {
    rdr: Box<dyn BufRead>,
    raw: Vec<u8>,
    max_line_bytes: Option<usize>,
    after_cr: bool,
}

impl ChunkReader {
    pub fn open(path: &Path, buf_bytes: usize) -> Result<Self> {
        let inner = open_decoded(path)?;
        Ok(Self {
            rdr: Box::new(BufReader::with_capacity(buf_bytes.max(8 * 1024), inner)),
            raw: Vec::with_capacity(1024),
            max_line_bytes: None,
            after_cr: false,
        })
    }

    /// Buffer only as many raw bytes per line as `max_chars` characters can span;
    /// the rest of the line is skipped while looking for its terminator.
    pub fn with_char_cap(mut self, max_chars: usize) -> Self {
        // one decoded char (or replaced invalid sequence) spans at most 4 bytes
        self.max_line_bytes = Some(max_chars.saturating_mul(4));
        self
    }

    /// Read the next line into `buf` without its terminator.
    /// Returns the number of raw bytes consumed (0 on EOF).
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        self.raw.clear();

        // the `\n` of a `\r\n` split across two reads
        if std::mem::take(&mut self.after_cr) {
            if fill_retrying(&mut *self.rdr)?.first() == Some(&b'\n') {
                self.rdr.consume(1);
            }
        }

        let mut consumed = 0usize;
        loop {
            let avail = fill_retrying(&mut *self.rdr)?;
            if avail.is_empty() {
                break;
            }
            let (keep, used, done) = match avail.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(i) => {
                    self.after_cr = avail[i] == b'\r';
                    (i, i + 1, true)
                }
                None => (avail.len(), avail.len(), false),
            };
            let room = match self.max_line_bytes {
                Some(cap) => keep.min(cap.saturating_sub(self.raw.len())),
                None => keep,
            };
            self.raw.extend_from_slice(&avail[..room]);
            self.rdr.consume(used);
            consumed += used;
            if done {
                break;
            }
        }

        if consumed == 0 {
            return Ok(0);
        }
        buf.push_str(&String::from_utf8_lossy(&self.raw));
        Ok(consumed)
    }
}

fn fill_retrying(rdr: &mut dyn BufRead) -> io::Result<&[u8]> {
    loop {
        match rdr.fill_buf() {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    rdr.fill_buf()
}

fn drive(
    mut rdr: ChunkReader,
    path: &Path,
    mut on_line: impl FnMut(usize, &str) -> Result<()>,
) -> Result<usize> {
    let mut buf = String::with_capacity(1024);
    let mut idx = 0usize;
    loop {
        let n = rdr.read_line(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        on_line(idx, &buf)?;
        idx += 1;
    }
    Ok(idx)
}

/// Stream every raw line of a chunk; `on_line` receives the zero-based index and the
/// full decoded line. Returns the number of lines seen.
pub fn for_each_line(
    path: &Path,
    read_buf_bytes: usize,
    on_line: impl FnMut(usize, &str) -> Result<()>,
) -> Result<usize> {
    drive(ChunkReader::open(path, read_buf_bytes)?, path, on_line)
}

/// Like `for_each_line`, but each line arrives truncated to `max_chars` characters
/// and trimmed, and bytes past the cap are never buffered.
pub fn for_each_normalized_line(
    path: &Path,
    read_buf_bytes: usize,
    max_chars: usize,
    mut on_line: impl FnMut(usize, &str) -> Result<()>,
) -> Result<usize> {
    let rdr = ChunkReader::open(path, read_buf_bytes)?.with_char_cap(max_chars);
    drive(rdr, path, |idx, raw| on_line(idx, normalize_line(raw, max_chars)))
}

/// Keep at most `max_chars` characters, then strip surrounding whitespace.
/// Truncation happens first, so anything past the cap is never seen by the heuristics.
pub fn normalize_line(raw: &str, max_chars: usize) -> &str {
    let cut = raw.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(raw.len());
    raw[..cut].trim()
}

/// Collect the first `max_lines` normalized lines of a chunk for schema detection.
pub fn read_sample(path: &Path, read_buf_bytes: usize, max_lines: usize, max_line_length: usize) -> Result<Vec<String>> {
    let mut rdr = ChunkReader::open(path, read_buf_bytes)?.with_char_cap(max_line_length);
    let mut buf = String::with_capacity(1024);
    let mut lines = Vec::new();
    while lines.len() < max_lines {
        let n = rdr.read_line(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        lines.push(normalize_line(&buf, max_line_length).to_string());
    }
    Ok(lines)
}

/// Decode the whole chunk to EOF, discarding output; errors indicate corruption.
pub fn validate_chunk_full(path: &Path) -> Result<u64> {
    let mut dec = open_decoded(path)?;
    let n = io::copy(&mut dec, &mut io::sink()).with_context(|| format!("decode {}", path.display()))?;
    Ok(n)
}

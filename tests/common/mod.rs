#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Write a gzip chunk with one `\n`-terminated line per entry.
pub fn write_gz_lines(path: &Path, lines: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Write a zstd chunk with one `\n`-terminated line per entry.
pub fn write_zst_lines(path: &Path, lines: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Write an uncompressed file verbatim (no terminators added).
pub fn write_raw(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

/// Every line of a text file, blank ones included.
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    BufReader::new(f).lines().map(|l| l.unwrap()).collect()
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_reader(BufReader::new(File::open(path).unwrap())).unwrap()
}

/// Decompress a gzip file into its lines.
pub fn decompress_gz_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let dec = flate2::read::MultiGzDecoder::new(f);
    BufReader::new(dec).lines().map(|l| l.unwrap()).collect()
}

/// A parse-output style chunk directory: `<root>/<id>/records.tsv` (+ optional error indices).
pub fn write_chunk_dir(root: &Path, id: &str, records: &[&str], error_indices: Option<&[usize]>) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    let mut body = String::new();
    for r in records {
        body.push_str(r);
        body.push('\n');
    }
    fs::write(dir.join("records.tsv"), body).unwrap();
    if let Some(idx) = error_indices {
        let s: String = idx.iter().map(|i| format!("{i}\n")).collect();
        fs::write(dir.join("error_indices.txt"), s).unwrap();
    }
}

//! Email-shape regexes shared by schema detection and parsing.
//!
//! Every pattern is built around the same loose email shape (a non-space run with an
//! `@`, followed by a non-space run with a `.`) and a character class of field
//! delimiters. Patterns are compiled once per run (detection) or per chunk (parsing).

use crate::error::PipelineError;
use anyhow::{Context, Result};
use regex::Regex;

/// Loose email shape: deliberately permissive, the detector only votes on layout.
pub const EMAIL_SHAPE: &str = r"\S+@\S+\.\S+";

/// Build a regex character class matching any of `chars`.
/// Each character is escaped, so `-`, `^`, `]` and friends are taken literally.
pub fn delimiter_class(chars: &str) -> Result<String> {
    if chars.is_empty() {
        return Err(PipelineError::InvalidConfig("delimiter candidate set is empty".into()).into());
    }
    Ok(format!("[{}]", regex::escape(chars)))
}

/// The four placement hypotheses, tested in priority order.
#[derive(Clone, Debug)]
pub struct DetectionPatterns {
    /// `^EMAIL[D]+`: email first, credential after.
    pub head: Regex,
    /// `[D]+EMAIL$`: credential first, email last.
    pub tail: Regex,
    /// `[D]+EMAIL[D]`: email somewhere in the middle of noise.
    pub middle: Regex,
    /// `^EMAIL$`: nothing but an email.
    pub only: Regex,
}

impl DetectionPatterns {
    pub fn new(delimiter_candidates: &str) -> Result<Self> {
        let class = delimiter_class(delimiter_candidates)?;
        Ok(Self {
            head: compile(&format!("^{EMAIL_SHAPE}{class}+"))?,
            tail: compile(&format!("{class}+{EMAIL_SHAPE}$"))?,
            middle: middle_with_class(&class)?,
            only: compile(&format!("^{EMAIL_SHAPE}$"))?,
        })
    }
}

/// Middle pattern anchored on one specific delimiter, as the parser needs it.
pub fn middle_pattern(delimiter: char) -> Result<Regex> {
    let class = delimiter_class(delimiter.encode_utf8(&mut [0u8; 4]))?;
    middle_with_class(&class)
}

fn middle_with_class(class: &str) -> Result<Regex> {
    compile(&format!("{class}+{EMAIL_SHAPE}{class}"))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("compile pattern {pattern:?}"))
}

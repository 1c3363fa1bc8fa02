//! Schema detection: classify each sampled line against the placement hypotheses,
//! then take the mode of placements and, independently, the mode of delimiters.

use crate::patterns::DetectionPatterns;
use crate::schema::{Delimiter, Placement, Schema};
use ahash::AHashMap;
use anyhow::Result;
use std::hash::Hash;

/// One line's opinion about the chunk layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineVote {
    pub placement: Placement,
    pub delimiter: Delimiter,
}

impl LineVote {
    const NONE: LineVote = LineVote {
        placement: Placement::NotApplicable,
        delimiter: Delimiter::NotApplicable,
    };
}

#[derive(Clone, Debug)]
pub struct SchemaDetector {
    patterns: DetectionPatterns,
}

impl SchemaDetector {
    pub fn new(delimiter_candidates: &str) -> Result<Self> {
        Ok(Self { patterns: DetectionPatterns::new(delimiter_candidates)? })
    }

    /// Test head, tail, middle and email-only hypotheses in that order; first match wins.
    /// `line` is expected to be truncated and trimmed already.
    pub fn classify(&self, line: &str) -> LineVote {
        let p = &self.patterns;
        if let Some(m) = p.head.find(line) {
            // last delimiter character of the trailing run
            return vote(Placement::EmailPoh, line[..m.end()].chars().next_back());
        }
        if let Some(m) = p.tail.find(line) {
            return vote(Placement::PohEmail, line[m.start()..].chars().next());
        }
        if let Some(m) = p.middle.find(line) {
            return vote(Placement::UnknownEmailUnknown, line[m.start()..].chars().next());
        }
        if p.only.is_match(line) {
            return LineVote { placement: Placement::EmailOnly, delimiter: Delimiter::NotApplicable };
        }
        LineVote::NONE
    }

    /// Infer the schema of a sample of lines.
    pub fn detect<I, S>(&self, lines: I) -> Schema
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let votes: Vec<LineVote> = lines.into_iter().map(|l| self.classify(l.as_ref())).collect();
        schema_from_votes(&votes)
    }
}

fn vote(placement: Placement, delimiter: Option<char>) -> LineVote {
    match delimiter {
        Some(c) => LineVote { placement, delimiter: Delimiter::Char(c) },
        None => LineVote::NONE,
    }
}

/// Placement and delimiter are reduced separately, so the pair may not have been
/// produced by any single line. An empty sample is undetermined.
pub fn schema_from_votes(votes: &[LineVote]) -> Schema {
    let placement = mode(votes.iter().map(|v| v.placement));
    let delimiter = mode(votes.iter().map(|v| v.delimiter));
    match (placement, delimiter) {
        (Some(placement), Some(delimiter)) => Schema { placement, delimiter },
        _ => Schema::UNDETERMINED,
    }
}

/// Most frequent value; ties go to the value seen first.
pub fn mode<T, I>(values: I) -> Option<T>
where
    T: Copy + Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts: AHashMap<T, usize> = AHashMap::new();
    let mut order: Vec<T> = Vec::new();
    for v in values {
        let c = counts.entry(v).or_insert(0);
        if *c == 0 {
            order.push(v);
        }
        *c += 1;
    }

    let mut best: Option<(T, usize)> = None;
    for v in order {
        let c = counts.get(&v).copied().unwrap_or(0);
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((v, c));
        }
    }
    best.map(|(v, _)| v)
}

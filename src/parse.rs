//! Apply a detected schema to individual lines.

use crate::patterns::middle_pattern;
use crate::schema::{Placement, Schema};
use anyhow::Result;
use regex::Regex;
use std::fmt;

/// Why a line could not be turned into a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseFailure {
    /// The line does not contain the chunk's delimiter.
    DelimiterNotFound,
    /// No delimited email-shaped token in the line.
    NoEmailMatch,
    /// The schema names a delimited placement but carries no delimiter.
    SchemaWithoutDelimiter,
    /// The split left nothing on the email side.
    EmptyEmail,
    /// The chunk's placement is `n/a`.
    UndeterminedPlacement,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseFailure::DelimiterNotFound => "delimiter not found",
            ParseFailure::NoEmailMatch => "no delimited email token",
            ParseFailure::SchemaWithoutDelimiter => "schema has no delimiter",
            ParseFailure::EmptyEmail => "empty email",
            ParseFailure::UndeterminedPlacement => "placement undetermined",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed { email: String, poh: String },
    Failed(ParseFailure),
}

impl ParseOutcome {
    fn parsed(email: &str, poh: &str) -> Self {
        ParseOutcome::Parsed { email: email.trim().to_string(), poh: poh.trim().to_string() }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ParseOutcome::Failed(_))
    }
}

fn split_record(email: &str, poh: &str) -> ParseOutcome {
    if email.trim().is_empty() {
        return ParseOutcome::Failed(ParseFailure::EmptyEmail);
    }
    ParseOutcome::parsed(email, poh)
}

/// Per-chunk parser. The middle pattern, when needed, is compiled once here.
#[derive(Clone, Debug)]
pub struct LineParser {
    placement: Placement,
    delimiter: Option<char>,
    middle: Option<Regex>,
}

impl LineParser {
    pub fn new(schema: &Schema) -> Result<Self> {
        let delimiter = schema.delimiter.as_char();
        let middle = match (schema.placement, delimiter) {
            (Placement::UnknownEmailUnknown, Some(d)) => Some(middle_pattern(d)?),
            _ => None,
        };
        Ok(Self { placement: schema.placement, delimiter, middle })
    }

    /// `line` is expected to be truncated and trimmed already.
    pub fn parse(&self, line: &str) -> ParseOutcome {
        match self.placement {
            Placement::EmailPoh => match self.split(line) {
                Ok((first, rest)) => split_record(first, rest),
                Err(f) => ParseOutcome::Failed(f),
            },
            Placement::PohEmail => match self.split(line) {
                Ok((first, rest)) => split_record(rest, first),
                Err(f) => ParseOutcome::Failed(f),
            },
            Placement::UnknownEmailUnknown => self.parse_middle(line),
            // verbatim, even when blank
            Placement::EmailOnly => ParseOutcome::parsed(line, ""),
            Placement::NotApplicable => ParseOutcome::Failed(ParseFailure::UndeterminedPlacement),
        }
    }

    /// Split on the first delimiter only; later occurrences stay in the remainder.
    fn split<'a>(&self, line: &'a str) -> Result<(&'a str, &'a str), ParseFailure> {
        let d = self.delimiter.ok_or(ParseFailure::SchemaWithoutDelimiter)?;
        line.split_once(d).ok_or(ParseFailure::DelimiterNotFound)
    }

    /// Only the email is recovered; the credential's position in the noise is unknown.
    fn parse_middle(&self, line: &str) -> ParseOutcome {
        let (Some(d), Some(re)) = (self.delimiter, self.middle.as_ref()) else {
            return ParseOutcome::Failed(ParseFailure::SchemaWithoutDelimiter);
        };
        match re.find(line) {
            Some(m) => {
                let email: String = m.as_str().chars().filter(|c| *c != d).collect();
                ParseOutcome::parsed(&email, "")
            }
            None => ParseOutcome::Failed(ParseFailure::NoEmailMatch),
        }
    }
}

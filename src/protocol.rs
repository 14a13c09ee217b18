//! Bounded reading and parsing of the untrusted launcher-entry protocol.
//!
//! Responsibilities:
//! - Read a capped number of size-capped lines from an untrusted byte source
//!   (local stdin or the stdout of the in-VM listing service).
//! - Classify each line as blank/ignorable/structured and extract
//!   `(entry name, key, raw value)` triples from structured lines.
//!
//! Nothing in here trusts the data: entry names and keys get only minimal
//! structural guarantees (restricted character sets, no '/', no NUL, no '='
//! in keys). Values are still raw and must go through the sanitizer.

// -- crate imports
use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::trace;

// -- module imports
use crate::error::SyncError;

/// Resource caps applied while reading from the untrusted source.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum bytes per line; longer lines are split at this boundary.
    pub line_bytes: usize,
    /// Maximum number of lines accepted before the run is aborted.
    pub line_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            line_bytes: 1024,
            line_count: 100_000,
        }
    }
}

/// One structurally valid data line, not yet sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTriple {
    /// Launcher entry base name. Guaranteed free of '/', NUL and whitespace
    /// by the parser's character set; the value is otherwise untrusted.
    pub entry: String,
    /// Field key, possibly carrying a bracketed locale qualifier. Vocabulary
    /// lookup happens later; unknown keys are dropped there.
    pub key: String,
    /// Raw value, trimmed of surrounding whitespace. Untrusted.
    pub value: String,
}

/// Read one bounded line from `src`.
///
/// Reads up to `cap` bytes or until a newline, whichever comes first; the
/// remainder of an over-long line is returned by the next call. Returns
/// `None` once the source is exhausted.
async fn next_chunk<R: AsyncBufRead + Unpin>(src: &mut R, cap: usize) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();

    loop {
        let buf = src.fill_buf().await?;
        if buf.is_empty() {
            return Ok(if line.is_empty() { None } else { Some(line) });
        }

        let room = cap - line.len();
        let take = buf.len().min(room);
        if let Some(pos) = buf[..take].iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..pos]);
            src.consume(pos + 1);
            return Ok(Some(line));
        }

        line.extend_from_slice(&buf[..take]);
        src.consume(take);
        if line.len() >= cap {
            return Ok(Some(line));
        }
    }
}

/// Read capped, trimmed lines from a local stream (stdin over qrexec).
///
/// A local stream is expected to be valid UTF-8; a decode failure here is
/// fatal, unlike the remote-service path which silently drops undecodable
/// lines. The asymmetry is inherited behavior and kept on purpose.
///
/// # Errors
/// - [`SyncError::LimitExceeded`] once more than `limits.line_count` lines
///   have been read.
pub async fn read_local_lines<R: AsyncBufRead + Unpin>(
    mut src: R,
    limits: &Limits,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    while let Some(chunk) = next_chunk(&mut src, limits.line_bytes).await? {
        if lines.len() >= limits.line_count {
            return Err(SyncError::LimitExceeded.into());
        }
        let line = String::from_utf8(chunk)?;
        lines.push(line.trim().to_string());
    }

    Ok(lines)
}

/// Read capped, trimmed lines from the in-VM service's stdout.
///
/// The remote stream is decoded under a strict ASCII policy: any line
/// containing a non-ASCII byte is dropped without an error (expected
/// adversarial shape, not an anomaly). Dropped lines still count against the
/// line cap.
///
/// # Errors
/// - [`SyncError::LimitExceeded`] once more than `limits.line_count` lines
///   have been read.
pub async fn read_service_lines<R: AsyncBufRead + Unpin>(
    mut src: R,
    limits: &Limits,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut seen = 0usize;

    while let Some(chunk) = next_chunk(&mut src, limits.line_bytes).await? {
        seen += 1;
        if seen > limits.line_count {
            return Err(SyncError::LimitExceeded.into());
        }
        if !chunk.is_ascii() {
            trace!("dropping non-ASCII line from service stream");
            continue;
        }
        // ASCII is valid UTF-8.
        let line = String::from_utf8(chunk)?;
        lines.push(line.trim().to_string());
    }

    Ok(lines)
}

/// Extract structured triples from raw lines.
///
/// Blank lines, ignorable lines and lines matching neither shape are
/// discarded without an error; an adversarial source must not be able to
/// abort the run with a malformed line.
pub fn parse_triples(lines: &[String]) -> Vec<ParsedTriple> {
    lines
        .iter()
        .filter(|l| !l.is_empty() && !is_ignorable(l))
        .filter_map(|l| parse_data_line(l))
        .collect()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn is_locale_char(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '@' | '_')
}

/// Comment/ignorable shape: a file-name-like token ending in `.desktop`,
/// a ':', then either a '#'-prefixed comment or nothing but whitespace.
fn is_ignorable(line: &str) -> bool {
    for (pos, _) in line.match_indices(".desktop:") {
        let has_token = line[..pos].ends_with(is_name_char);
        let rest = &line[pos + ".desktop:".len()..];
        if has_token && (rest.starts_with('#') || rest.trim().is_empty()) {
            return true;
        }
    }
    false
}

/// Attempt to parse a structured data line:
/// `<entry-name>[.desktop]:<key>[<locale>]=<value>`.
///
/// Matching searches the line (a grep-style file path prefix before the
/// entry name is tolerated and skipped): each ':' is tried in order until
/// one yields a well-formed triple.
pub fn parse_data_line(line: &str) -> Option<ParsedTriple> {
    for (colon, _) in line.match_indices(':') {
        let Some(entry) = entry_name_before(&line[..colon]) else {
            continue;
        };
        let Some((key, value)) = key_value_after(&line[colon + 1..]) else {
            continue;
        };
        return Some(ParsedTriple {
            entry: entry.to_string(),
            key: key.to_string(),
            value: value.trim().to_string(),
        });
    }
    None
}

/// The entry name is the longest run of name characters immediately before
/// the ':', with a single `.desktop` suffix stripped when the remainder is
/// non-empty. The restricted character set excludes '/' and NUL, so a name
/// embedded in a path resolves to its final component.
fn entry_name_before(prefix: &str) -> Option<&str> {
    let start = prefix
        .rfind(|c| !is_name_char(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let run = &prefix[start..];
    if run.is_empty() {
        return None;
    }
    match run.strip_suffix(".desktop") {
        Some(stem) if !stem.is_empty() => Some(stem),
        _ => Some(run),
    }
}

/// Parse `<key>[<locale>]` plus `= <value>` from the text after the ':'.
/// The locale qualifier stays part of the key, which makes localized keys
/// fail the later vocabulary lookup and be dropped, as intended.
fn key_value_after(rest: &str) -> Option<(&str, &str)> {
    let key_end = rest.find(|c| !is_key_char(c)).unwrap_or(rest.len());
    if key_end == 0 {
        return None;
    }

    let mut end = key_end;
    let after = &rest[key_end..];
    if let Some(bracketed) = after.strip_prefix('[') {
        let locale_end = bracketed.find(|c| !is_locale_char(c))?;
        if locale_end == 0 || !bracketed[locale_end..].starts_with(']') {
            return None;
        }
        end = key_end + 1 + locale_end + 1;
    }

    let tail = rest[end..].trim_start_matches([' ', '\t']);
    let value = tail.strip_prefix('=')?;
    Some((&rest[..end], value))
}

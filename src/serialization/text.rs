//! Line-oriented text rows: one row per line, whitespace-separated tokens.

use std::fmt::Write as _;
use std::io::{BufRead, Read, Write};
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::error::{FeatureError, Result};
use crate::feature::Feature;
use crate::metrics::ConvertSummary;
use crate::row::FeatureArena;
use crate::serialization::rows::{RowReader, RowWriter};

/// Splits a text line into tokens, mapping `null_token` to an absent element.
#[must_use]
pub fn split_tokens<'a>(line: &'a str, null_token: Option<&str>) -> Vec<Option<&'a str>> {
    line.split_whitespace()
        .map(|token| match null_token {
            Some(marker) if marker == token => None,
            _ => Some(token),
        })
        .collect()
}

/// Renders a row as space-separated tokens.
#[must_use]
pub fn format_row(features: &[Feature]) -> String {
    let mut line = String::new();
    push_row(&mut line, features);
    line
}

fn push_row(line: &mut String, features: &[Feature]) {
    for (idx, feature) in features.iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{feature}");
    }
}

/// Parses text rows from `input` and writes them as a binary row file to `output`.
///
/// A malformed or non-UTF-8 row aborts the conversion with [`FeatureError::Line`] unless
/// [`ConvertConfig::skip_invalid_rows`] is set, in which case it is logged and
/// dropped.
pub fn encode_text<R, W>(mut input: R, output: W, cfg: &ConvertConfig) -> Result<ConvertSummary>
where
    R: BufRead,
    W: Write,
{
    cfg.validate()?;
    let start = Instant::now();
    let mut summary = ConvertSummary::new();
    let mut writer = RowWriter::new(output, cfg.mode)?;
    let mut arena = FeatureArena::new();
    let null_token = cfg.null_token.as_deref();

    let mut line = Vec::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        let read = input
            .read_until(b'\n', &mut line)
            .map_err(|err| FeatureError::io(err, None))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        summary.rows_read += 1;

        let parsed = match std::str::from_utf8(&line) {
            Ok(text) => arena.parse_row(Some(&split_tokens(text, null_token)), cfg.mode),
            Err(err) => Err(err.into()),
        };
        let features = match parsed {
            Ok(features) => features.unwrap_or_default(),
            Err(err) if cfg.skip_invalid_rows => {
                warn!("skipping line {line_no}: {err}");
                summary.rows_skipped += 1;
                continue;
            }
            Err(err) => return Err(err.at_line(line_no)),
        };
        if features.is_empty() && cfg.skip_empty_rows {
            summary.rows_skipped += 1;
            continue;
        }
        writer
            .write_row(features)
            .map_err(|err| err.at_line(line_no))?;
        summary.rows_written += 1;
        summary.features += features.len() as u64;

        if cfg.progress_interval > 0 && summary.rows_read % cfg.progress_interval as u64 == 0 {
            info!(
                "encoded {} rows ({} features, {} bytes)",
                summary.rows_read,
                summary.features,
                writer.bytes_written()
            );
        }
    }

    summary.bytes_written = writer.bytes_written();
    writer.finish()?;
    summary.arena = arena.stats();
    summary.elapsed = start.elapsed();
    debug!(
        "text encode finished: rows={} written={} skipped={} reuse={:.3}",
        summary.rows_read,
        summary.rows_written,
        summary.rows_skipped,
        summary.arena.reuse_ratio()
    );
    Ok(summary)
}

/// Reads a binary row file from `input` and writes one text line per row to `output`.
///
/// Fails with [`FeatureError::Unrenderable`] on a feature whose token form
/// would parse back differently (see [`Feature::is_token_safe`]).
pub fn decode_to_text<R, W>(input: R, mut output: W) -> Result<ConvertSummary>
where
    R: Read,
    W: Write,
{
    let start = Instant::now();
    let mut summary = ConvertSummary::new();
    let mut reader = RowReader::new(input)?;
    let mut arena = FeatureArena::new();
    let mut line = String::new();

    while let Some(features) = reader.next_row(&mut arena)? {
        if let Some(feature) = features.iter().find(|f| !f.is_token_safe()) {
            return Err(FeatureError::Unrenderable {
                row: summary.rows_read,
                feature: format!("{feature:?}"),
            });
        }
        summary.rows_read += 1;
        line.clear();
        push_row(&mut line, features);
        line.push('\n');
        output
            .write_all(line.as_bytes())
            .map_err(|err| FeatureError::io(err, None))?;
        summary.rows_written += 1;
        summary.features += features.len() as u64;
        summary.bytes_written += line.len() as u64;
    }
    output
        .flush()
        .map_err(|err| FeatureError::io(err, None))?;

    summary.arena = arena.stats();
    summary.elapsed = start.elapsed();
    debug!(
        "text decode finished: mode={} rows={}",
        reader.mode(),
        summary.rows_read
    );
    Ok(summary)
}

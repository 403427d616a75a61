//! CSV encoding of member snapshots and diff records.
//!
//! The writer always emits a header row. The reader accepts input with or
//! without that header, and accepts both the plain member layout and the
//! extended diff layout, reading only the member columns from the latter.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{DiffRecord, Member, Snapshot};

pub const MEMBER_HEADER: [&str; 3] = ["Name", "Contributions", "Posts"];

pub const DIFF_HEADER: [&str; 7] = [
    "Name",
    "Contributions",
    "Posts",
    "PriorContributions",
    "PriorPosts",
    "DeltaContributions",
    "DeltaPosts",
];

/// Encode a member snapshot.
///
/// Names must contain a non-whitespace character, the same rule the
/// decoder applies.
pub fn encode_members(members: &[Member]) -> Result<Vec<u8>> {
    check_names(members.iter().map(|m| m.name.as_str()))?;
    encode(&MEMBER_HEADER, members)
}

/// Encode diff records in the extended layout.
pub fn encode_diff(records: &[DiffRecord]) -> Result<Vec<u8>> {
    check_names(records.iter().map(|r| r.name.as_str()))?;
    encode(&DIFF_HEADER, records)
}

fn check_names<'a>(mut names: impl Iterator<Item = &'a str>) -> Result<()> {
    match names.position(|name| name.trim().is_empty()) {
        Some(row) => Err(AppError::encode(format!("row {} has a blank member name", row + 1))),
        None => Ok(()),
    }
}

fn encode<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(header).map_err(AppError::encode)?;
    for row in rows {
        writer.serialize(row).map_err(AppError::encode)?;
    }
    writer.into_inner().map_err(|e| AppError::encode(e.error()))
}

/// Decode a snapshot written by [`encode_members`] or [`encode_diff`].
pub fn decode_members(bytes: &[u8]) -> Result<Snapshot> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut members = Vec::new();
    let mut seen = HashSet::new();

    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            AppError::decode(line, e)
        })?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 1);

        if index == 0 && is_header(&record) {
            continue;
        }

        if record.len() != MEMBER_HEADER.len() && record.len() != DIFF_HEADER.len() {
            return Err(AppError::decode(
                line,
                format!(
                    "expected {} or {} fields, found {}",
                    MEMBER_HEADER.len(),
                    DIFF_HEADER.len(),
                    record.len()
                ),
            ));
        }

        let name = &record[0];
        if name.trim().is_empty() {
            return Err(AppError::decode(line, "empty member name"));
        }
        if !seen.insert(name.to_string()) {
            return Err(AppError::decode(line, format!("duplicate member '{name}'")));
        }

        let contributions = parse_counter(&record, 1, line)?;
        let posts = parse_counter(&record, 2, line)?;
        if record.len() == DIFF_HEADER.len() {
            parse_counter(&record, 3, line)?;
            parse_counter(&record, 4, line)?;
            parse_field::<i64>(&record, 5, line)?;
            parse_field::<i64>(&record, 6, line)?;
        }

        members.push(Member {
            name: name.to_string(),
            contributions,
            posts,
        });
    }

    Ok(Snapshot::new(members))
}

fn is_header(record: &csv::StringRecord) -> bool {
    record.len() >= MEMBER_HEADER.len()
        && record
            .iter()
            .zip(MEMBER_HEADER)
            .all(|(field, expected)| field.trim().eq_ignore_ascii_case(expected))
}

/// Counters are stored unsigned but must fit in `i64` for deltas.
fn parse_counter(record: &csv::StringRecord, index: usize, line: u64) -> Result<u64> {
    let value = parse_field::<i64>(record, index, line)?;
    u64::try_from(value).map_err(|_| {
        AppError::decode(line, format!("{} '{}' is negative", DIFF_HEADER[index], value))
    })
}

fn parse_field<T: std::str::FromStr>(record: &csv::StringRecord, index: usize, line: u64) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let column = DIFF_HEADER[index];
    let raw = record[index].trim();
    raw.parse()
        .map_err(|e| AppError::decode(line, format!("{column} '{raw}': {e}")))
}

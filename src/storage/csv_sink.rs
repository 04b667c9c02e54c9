//! Append-only CSV sink
//!
//! The output file is both the result and the resume state: on open, its
//! `id` column becomes the [`CommitLedger`]. Each append is flushed and
//! fsynced before it returns, and a torn final row left by a crash is cut
//! off on the next open.

use crate::extract::Record;
use crate::storage::schema::{header, record_to_row, ID_COLUMN};
use crate::storage::{CommitLedger, Sink, StorageError, StorageResult};
use crate::Identifier;
use chrono::{SecondsFormat, Utc};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// CSV file sink with serialized, durable appends
pub struct CsvSink {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    /// Opens (or creates) the output file and derives the commit ledger
    ///
    /// # Arguments
    ///
    /// * `path` - Output CSV path
    /// * `resume` - Keep existing rows; `false` truncates the file
    ///
    /// # Returns
    ///
    /// * `Ok((CsvSink, CommitLedger))` - Sink positioned at the end of the
    ///   file and the set of identifiers already in it
    /// * `Err(StorageError)` - The file cannot be read or written, has a
    ///   different header, or holds a corrupt row before its last line
    pub fn open(path: &Path, resume: bool) -> StorageResult<(Self, CommitLedger)> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let ledger = if resume && path.exists() {
            recover(path)?
        } else {
            if path.exists() {
                tracing::warn!("Truncating existing output {}", path.display());
            }
            File::create(path)?;
            CommitLedger::new()
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        if needs_header {
            writer.write_record(header())?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        tracing::info!(
            "Opened output {} with {} committed rows",
            path.display(),
            ledger.len()
        );

        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Mutex::new(writer),
            },
            ledger,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for CsvSink {
    fn append(&self, record: &Record) -> StorageResult<()> {
        let crawled_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let row = record_to_row(record, &crawled_at)?;

        let mut writer = self.writer.lock().map_err(|_| StorageError::Poisoned)?;
        writer.write_record(&row)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

fn ends_with_newline(path: &Path) -> StorageResult<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Reads the identifiers of an existing output, cutting off a torn last row
fn recover(path: &Path) -> StorageResult<CommitLedger> {
    let expected = header();
    let clean_end = ends_with_newline(path)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut ids: Vec<Identifier> = Vec::new();
    let mut pending: Option<(u64, StringRecord)> = None;
    let mut row_index: u64 = 0;

    loop {
        let start = reader.position().byte();
        let mut record = StringRecord::new();
        if !reader.read_record(&mut record)? {
            break;
        }

        if let Some((_, previous)) = pending.replace((start, record)) {
            accept_row(&previous, row_index, &expected, &mut ids)?;
            row_index += 1;
        }
    }

    if let Some((start, last)) = pending {
        let complete = clean_end && (row_index == 0 || last.len() == expected.len());
        if complete {
            accept_row(&last, row_index, &expected, &mut ids)?;
        } else if row_index == 0 && !is_header_prefix(&last, &expected) {
            return Err(StorageError::SchemaMismatch(format!(
                "unrecognized first line {:?}",
                last.iter().collect::<Vec<_>>()
            )));
        } else {
            tracing::warn!(
                "Output {} ends with an incomplete row at byte {}; truncating it",
                path.display(),
                start
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(start)?;
            file.sync_all()?;
        }
    }

    let unique = ids.len();
    let ledger = CommitLedger::from_ids(ids);
    if ledger.len() != unique {
        tracing::warn!(
            "Output {} contains {} duplicate identifiers",
            path.display(),
            unique - ledger.len()
        );
    }

    Ok(ledger)
}

/// True if `record` could be the start of a header cut off mid-write
fn is_header_prefix(record: &StringRecord, expected: &[String]) -> bool {
    if record.len() > expected.len() {
        return false;
    }
    let last = record.len().saturating_sub(1);
    record.iter().enumerate().all(|(i, field)| {
        if i == last {
            expected[i].starts_with(field)
        } else {
            expected[i] == field
        }
    })
}

fn accept_row(
    record: &StringRecord,
    row_index: u64,
    expected: &[String],
    ids: &mut Vec<Identifier>,
) -> StorageResult<()> {
    if row_index == 0 {
        let found: Vec<&str> = record.iter().collect();
        if found != expected.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(StorageError::SchemaMismatch(format!(
                "expected {} columns starting with '{}', found {:?}",
                expected.len(),
                ID_COLUMN,
                found
            )));
        }
        return Ok(());
    }

    if record.len() != expected.len() {
        return Err(StorageError::Corrupt {
            row: row_index,
            reason: format!("expected {} fields, found {}", expected.len(), record.len()),
        });
    }

    let raw = record.get(0).unwrap_or_default();
    let id = raw.trim().parse::<Identifier>().map_err(|_| StorageError::Corrupt {
        row: row_index,
        reason: format!("invalid id '{}'", raw),
    })?;
    ids.push(id);
    Ok(())
}

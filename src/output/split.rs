//! Dataset export: filter out rows without times and split by content type

use crate::extract::ContentType;
use crate::output::{column_index, has_completion_times, time_column_indices};
use crate::storage::{StorageResult, CONTENT_TYPE_COLUMN, SERVICE_COLUMNS};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Writer, WriterBuilder};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Content types that get their own export file
const SPLIT_TYPES: [ContentType; 3] = [ContentType::Game, ContentType::Dlc, ContentType::Multiplayer];

/// One file written by [`split_dataset`]
#[derive(Debug, Clone)]
pub struct SplitFile {
    pub content_type: ContentType,
    pub path: PathBuf,
    pub rows: u64,
}

/// What [`split_dataset`] read and wrote
#[derive(Debug, Clone)]
pub struct SplitReport {
    /// Rows in the source file
    pub total_rows: u64,

    /// Rows with at least one completion time
    pub kept_rows: u64,

    pub filtered_path: PathBuf,
    pub files: Vec<SplitFile>,

    /// Kept rows whose content type has no export file
    pub other_rows: u64,
}

struct Target {
    file: SplitFile,
    writer: Writer<File>,
}

fn export_writer(path: &Path) -> StorageResult<Writer<File>> {
    Ok(WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)?)
}

/// Writes the filtered dataset and one file per content type
///
/// Rows whose completion-time cells are all empty are dropped, as are the
/// crawl bookkeeping columns (`source_url`, `crawled_at`). Files are named
/// after the source: `<stem>_filtered.csv`, `<stem>_game.csv`,
/// `<stem>_dlc.csv` and `<stem>_multiplayer.csv`.
///
/// # Arguments
///
/// * `source` - Output CSV produced by a harvest
/// * `out_dir` - Directory for the exported files (created if missing)
pub fn split_dataset(source: &Path, out_dir: &Path) -> StorageResult<SplitReport> {
    fs::create_dir_all(out_dir)?;

    let mut reader = ReaderBuilder::new().from_path(source)?;
    let headers = reader.headers()?.clone();

    let content_type = column_index(&headers, CONTENT_TYPE_COLUMN)?;
    let times = time_column_indices(&headers)?;
    let kept: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !SERVICE_COLUMNS.contains(name))
        .map(|(index, _)| index)
        .collect();
    let project = |row: &StringRecord| -> Vec<String> {
        kept.iter()
            .map(|&i| row.get(i).unwrap_or_default().to_string())
            .collect()
    };
    let kept_header = project(&headers);

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let filtered_path = out_dir.join(format!("{}_filtered.csv", stem));
    let mut filtered = export_writer(&filtered_path)?;
    filtered.write_record(&kept_header)?;

    let mut targets = Vec::with_capacity(SPLIT_TYPES.len());
    for kind in SPLIT_TYPES {
        let path = out_dir.join(format!("{}_{}.csv", stem, kind.as_str()));
        let mut writer = export_writer(&path)?;
        writer.write_record(&kept_header)?;
        targets.push(Target {
            file: SplitFile {
                content_type: kind,
                path,
                rows: 0,
            },
            writer,
        });
    }

    let mut report = SplitReport {
        total_rows: 0,
        kept_rows: 0,
        filtered_path,
        files: Vec::new(),
        other_rows: 0,
    };

    for row in reader.records() {
        let row = row?;
        report.total_rows += 1;

        if !has_completion_times(&row, &times) {
            continue;
        }
        report.kept_rows += 1;

        let projected = project(&row);
        filtered.write_record(&projected)?;

        let kind = row
            .get(content_type)
            .and_then(|value| value.parse::<ContentType>().ok());
        match targets
            .iter_mut()
            .find(|target| Some(target.file.content_type) == kind)
        {
            Some(target) => {
                target.writer.write_record(&projected)?;
                target.file.rows += 1;
            }
            None => report.other_rows += 1,
        }
    }

    filtered.flush()?;
    for mut target in targets {
        target.writer.flush()?;
        report.files.push(target.file);
    }

    tracing::info!(
        "Split {} rows from {}: kept {}, {} of other types",
        report.total_rows,
        source.display(),
        report.kept_rows,
        report.other_rows
    );

    Ok(report)
}

/// Prints a split report to stdout
pub fn print_split_report(report: &SplitReport) {
    println!("=== Dataset Export ===\n");
    println!("Rows read: {}", report.total_rows);
    println!(
        "Rows with completion times: {} -> {}",
        report.kept_rows,
        report.filtered_path.display()
    );
    for file in &report.files {
        println!(
            "  {}: {} rows -> {}",
            file.content_type,
            file.rows,
            file.path.display()
        );
    }
    if report.other_rows > 0 {
        println!("  other types: {} rows (not exported separately)", report.other_rows);
    }
}

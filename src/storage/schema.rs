//! Output file schema
//!
//! Completion times use a hybrid layout that stays fixed for the life of a
//! file: each of the seven known labels gets a `<label>_polled, <label>`
//! column pair, and any other label goes into the `other_times` JSON object.

use crate::extract::{format_hours, Record, KNOWN_LABELS};
use crate::storage::StorageResult;
use serde::Serialize;
use std::collections::BTreeMap;

pub const ID_COLUMN: &str = "id";
pub const TITLE_COLUMN: &str = "title";
pub const CONTENT_TYPE_COLUMN: &str = "content_type";
pub const RELEASE_PRECISION_COLUMN: &str = "release_precision";
pub const OTHER_TIMES_COLUMN: &str = "other_times";
pub const SOURCE_URL_COLUMN: &str = "source_url";
pub const CRAWLED_AT_COLUMN: &str = "crawled_at";

/// Columns that only describe the crawl, not the game
pub const SERVICE_COLUMNS: [&str; 2] = [SOURCE_URL_COLUMN, CRAWLED_AT_COLUMN];

/// Full header, in column order
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = [
        ID_COLUMN,
        TITLE_COLUMN,
        CONTENT_TYPE_COLUMN,
        RELEASE_PRECISION_COLUMN,
        "release_year",
        "release_month",
        "release_day",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    for label in KNOWN_LABELS {
        columns.push(format!("{}_polled", label));
        columns.push(label.to_string());
    }

    columns.push(OTHER_TIMES_COLUMN.to_string());
    columns.push(SOURCE_URL_COLUMN.to_string());
    columns.push(CRAWLED_AT_COLUMN.to_string());
    columns
}

/// Names of every column that holds completion-time data
pub fn time_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(KNOWN_LABELS.len() * 2 + 1);
    for label in KNOWN_LABELS {
        columns.push(format!("{}_polled", label));
        columns.push(label.to_string());
    }
    columns.push(OTHER_TIMES_COLUMN.to_string());
    columns
}

#[derive(Serialize)]
struct OtherTime {
    hours: f64,
    polled: u32,
}

/// Renders a record as one row matching [`header`]
///
/// # Arguments
///
/// * `record` - The record to render
/// * `crawled_at` - RFC 3339 timestamp of the commit
pub fn record_to_row(record: &Record, crawled_at: &str) -> StorageResult<Vec<String>> {
    let date = &record.release_date;
    let mut row = vec![
        record.id.to_string(),
        record.title.clone(),
        record.content_type.as_str().to_string(),
        date.precision().to_string(),
        date.year().map(|y| format!("{:04}", y)).unwrap_or_default(),
        date.month().map(|m| format!("{:02}", m)).unwrap_or_default(),
        date.day().map(|d| format!("{:02}", d)).unwrap_or_default(),
    ];

    for label in KNOWN_LABELS {
        match record.completion_times.get(label) {
            Some(time) => {
                row.push(time.polled_users.to_string());
                row.push(format_hours(time.hours));
            }
            None => {
                row.push(String::new());
                row.push(String::new());
            }
        }
    }

    let others: BTreeMap<&str, OtherTime> = record
        .completion_times
        .iter()
        .filter(|(label, _)| !label.is_known())
        .map(|(label, time)| {
            (
                label.as_str(),
                OtherTime {
                    hours: time.hours,
                    polled: time.polled_users,
                },
            )
        })
        .collect();

    row.push(if others.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&others)?
    });

    row.push(record.source_url.clone());
    row.push(crawled_at.to_string());
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{
        CompletionTime, CompletionTimes, ContentType, LabelVocabulary, ReleaseDate,
    };

    fn sample_record() -> Record {
        let vocab = LabelVocabulary::builtin();
        let mut times = CompletionTimes::new();
        times.insert(
            &vocab,
            "Main Story",
            CompletionTime {
                hours: 8.5,
                polled_users: 120,
            },
        );
        times.insert(
            &vocab,
            "Speedrun Any%",
            CompletionTime {
                hours: 1.25,
                polled_users: 4,
            },
        );

        Record {
            id: 42,
            title: "Sample, \"Quoted\"".to_string(),
            content_type: ContentType::Dlc,
            completion_times: times,
            release_date: ReleaseDate::YearMonth(2004, 6),
            source_url: "https://example.com/game/42".to_string(),
        }
    }

    #[test]
    fn test_header_layout() {
        let header = header();
        assert_eq!(header.len(), 7 + 14 + 3);
        assert_eq!(header[0], "id");
        assert_eq!(header[7], "main_story_polled");
        assert_eq!(header[8], "main_story");
        assert_eq!(header[20], "versus");
        assert_eq!(header[21], "other_times");
        assert_eq!(header[23], "crawled_at");
        assert_eq!(time_columns().len(), 15);
    }

    #[test]
    fn test_record_to_row() {
        let row = record_to_row(&sample_record(), "2026-01-01T00:00:00Z").unwrap();
        let header = header();
        assert_eq!(row.len(), header.len());

        let cell = |name: &str| row[header.iter().position(|h| h == name).unwrap()].clone();
        assert_eq!(cell("id"), "42");
        assert_eq!(cell("content_type"), "dlc");
        assert_eq!(cell("release_precision"), "month");
        assert_eq!(cell("release_year"), "2004");
        assert_eq!(cell("release_month"), "06");
        assert_eq!(cell("release_day"), "");
        assert_eq!(cell("main_story_polled"), "120");
        assert_eq!(cell("main_story"), "8.5");
        assert_eq!(cell("co_op"), "");
        assert_eq!(
            cell("other_times"),
            r#"{"speedrun any%":{"hours":1.25,"polled":4}}"#
        );
        assert_eq!(cell("crawled_at"), "2026-01-01T00:00:00Z");
    }
}

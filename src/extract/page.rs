//! HTML extraction for game pages
//!
//! This module turns a fetched page body into a [`Record`]:
//! - Title from the page header, falling back to JSON-LD metadata
//! - Completion times from the time tables, falling back to the stats list
//! - Content type from the "Note:" lines of the summary blocks
//! - Release date from the summary blocks, at whatever precision is present

use super::date::parse_release_date;
use super::hours::{parse_count, parse_hours};
use super::labels::{fold, LabelVocabulary, MAIN_STORY, SINGLE_PLAYER};
use super::record::{CompletionTime, CompletionTimes, ContentType, Record};
use super::selectors::*;
use crate::Identifier;
use scraper::{ElementRef, Html};
use std::fmt;
use thiserror::Error;

/// Why a page did not produce a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The page is the site's "not found" page
    NoSuchPage,

    /// The body is not an HTML document at all
    MalformedPage,

    /// The document is HTML but its required anchors are missing
    UnsupportedLayout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoSuchPage => "no_such_page",
            Self::MalformedPage => "malformed_page",
            Self::UnsupportedLayout => "unsupported_layout",
        };
        f.write_str(name)
    }
}

/// Structured extraction failure with diagnostic context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {context}")]
pub struct ExtractionFailure {
    pub reason: FailureReason,
    pub context: String,
}

impl ExtractionFailure {
    fn new(reason: FailureReason, context: impl Into<String>) -> Self {
        Self {
            reason,
            context: context.into(),
        }
    }
}

/// A fetched page handed to the extractor
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub id: Identifier,
    pub url: &'a str,
    pub body: &'a str,
}

/// Parses page bodies into records
///
/// Pure and deterministic: the same page always yields the same result, and
/// the extractor holds no mutable state, so one instance is shared by all
/// workers.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    vocabulary: LabelVocabulary,
}

impl Extractor {
    pub fn new(vocabulary: LabelVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Extracts a record from a page
    ///
    /// # Returns
    ///
    /// * `Ok(Record)` - The page was recognized; `completion_times` may be
    ///   empty if the page has no statistics yet
    /// * `Err(ExtractionFailure)` - The page is a not-found page, is not
    ///   HTML, or lacks the title or every content section
    ///
    /// # Example
    ///
    /// ```
    /// use hltb_harvest::extract::{Extractor, Page};
    ///
    /// let body = r#"<html><body>
    ///     <div class="GameHeader_profile_header__x1">Portal</div>
    ///     <div class="GameSummary_profile_info__y2">NA: October 10th, 2007</div>
    /// </body></html>"#;
    /// let page = Page { id: 7, url: "https://example.com/game/7", body };
    /// let record = Extractor::default().extract(&page).unwrap();
    /// assert_eq!(record.title, "Portal");
    /// ```
    pub fn extract(&self, page: &Page<'_>) -> Result<Record, ExtractionFailure> {
        if page.body.trim().is_empty() {
            return Err(ExtractionFailure::new(
                FailureReason::MalformedPage,
                "empty body",
            ));
        }
        if !page.body.contains('<') {
            return Err(ExtractionFailure::new(
                FailureReason::MalformedPage,
                format!("body has no markup ({} bytes)", page.body.len()),
            ));
        }

        let document = Html::parse_document(page.body);

        let Some(title) = extract_title(&document) else {
            if is_not_found_page(&document) {
                return Err(ExtractionFailure::new(
                    FailureReason::NoSuchPage,
                    "page title announces a missing page",
                ));
            }
            return Err(ExtractionFailure::new(
                FailureReason::UnsupportedLayout,
                "no game header or JSON-LD name",
            ));
        };

        let profile_texts: Vec<String> = document
            .select(&PROFILE_INFO)
            .map(joined_text)
            .filter(|text| !text.is_empty())
            .collect();
        let has_tables = document.select(&TIME_TABLE).next().is_some();
        let has_stats = document.select(&GAME_STATS).next().is_some();

        if profile_texts.is_empty() && !has_tables && !has_stats {
            return Err(ExtractionFailure::new(
                FailureReason::UnsupportedLayout,
                format!("no content sections found for '{}'", title),
            ));
        }

        let mut completion_times = self.times_from_tables(&document);
        if completion_times.is_empty() {
            completion_times = self.times_from_stats(&document);
        }

        Ok(Record {
            id: page.id,
            title,
            content_type: detect_content_type(&profile_texts),
            completion_times,
            release_date: parse_release_date(&profile_texts),
            source_url: page.url.to_string(),
        })
    }

    /// Reads the label / polled / average rows of the playstyle time tables
    ///
    /// Tables under any other heading (platform breakdowns, DLC lists) have
    /// different columns and are skipped. A table without a heading only
    /// contributes rows whose label the vocabulary already knows.
    fn times_from_tables(&self, document: &Html) -> CompletionTimes {
        let mut times = CompletionTimes::new();

        for table in document.select(&TIME_TABLE) {
            let heading = table.select(&TABLE_SECTION).next().map(joined_text);
            let section = TableSection::classify(heading.as_deref());
            if section == TableSection::Other {
                continue;
            }

            for row in table.select(&TABLE_ROW) {
                let cells: Vec<String> = row.select(&CELL).map(joined_text).collect();
                if cells.len() < 3 {
                    continue;
                }

                let label = match section {
                    TableSection::Speedrun => {
                        self.vocabulary.normalize(&format!("speedrun {}", cells[0]))
                    }
                    TableSection::Untitled if !self.vocabulary.recognizes(&cells[0]) => continue,
                    _ => self.vocabulary.normalize(&cells[0]),
                };

                let Some(hours) = parse_hours(&cells[2]) else {
                    continue;
                };
                let time = CompletionTime {
                    hours,
                    polled_users: parse_count(&cells[1]).unwrap_or(0),
                };

                // The single-player table leads with a "Main Story" row that
                // is really the single-player figure.
                if section == TableSection::SinglePlayer && label.as_str() == MAIN_STORY {
                    times.insert_canonical(self.vocabulary.normalize(SINGLE_PLAYER), time);
                }
                times.insert_canonical(label, time);
            }
        }

        times
    }

    /// Reads the compact stats list (label in `h4`, hours in `h5`)
    fn times_from_stats(&self, document: &Html) -> CompletionTimes {
        let mut times = CompletionTimes::new();

        let Some(stats) = document.select(&GAME_STATS).next() else {
            return times;
        };

        for item in stats.select(&STATS_ITEM) {
            let (Some(label), Some(value)) = (
                item.select(&STATS_LABEL).next(),
                item.select(&STATS_VALUE).next(),
            ) else {
                continue;
            };

            if let Some(hours) = parse_hours(&joined_text(value)) {
                times.insert(
                    &self.vocabulary,
                    &joined_text(label),
                    CompletionTime {
                        hours,
                        polled_users: 0,
                    },
                );
            }
        }

        if !times.contains(MAIN_STORY) {
            if let Some(single) = times.get(SINGLE_PLAYER).copied() {
                times.insert_canonical(self.vocabulary.normalize(MAIN_STORY), single);
            }
        }

        times
    }
}

/// What a time table holds, going by the first cell of its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableSection {
    SinglePlayer,
    MultiPlayer,
    Speedrun,
    Untitled,
    Other,
}

impl TableSection {
    fn classify(heading: Option<&str>) -> Self {
        match heading.map(fold).as_deref() {
            None | Some("") => Self::Untitled,
            Some("single player" | "singleplayer") => Self::SinglePlayer,
            Some("multi player" | "multiplayer") => Self::MultiPlayer,
            Some("speedrun" | "speedruns") => Self::Speedrun,
            Some(_) => Self::Other,
        }
    }
}

/// Text content of an element with whitespace collapsed
fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    if let Some(header) = document.select(&GAME_HEADER).next() {
        let text = joined_text(header);
        if !text.is_empty() {
            return Some(text);
        }
    }

    for script in document.select(&LD_JSON) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let items = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        for item in items {
            if let Some(name) = item.get("name").and_then(|n| n.as_str()) {
                let name = name.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    None
}

fn is_not_found_page(document: &Html) -> bool {
    document
        .select(&PAGE_TITLE)
        .next()
        .map(|title| {
            let text = joined_text(title).to_lowercase();
            text.contains("404") || text.contains("not found")
        })
        .unwrap_or(false)
}

fn detect_content_type(profile_texts: &[String]) -> ContentType {
    if profile_texts.is_empty() {
        return ContentType::Unknown;
    }

    let mut dlc = false;
    let mut multiplayer = false;
    for text in profile_texts {
        let lowered = text.to_lowercase();
        if lowered.contains("note:") {
            dlc |= lowered.contains("dlc/expansion");
            multiplayer |= lowered.contains("multiplayer focused");
        }
    }

    if dlc {
        ContentType::Dlc
    } else if multiplayer {
        ContentType::Multiplayer
    } else {
        ContentType::Game
    }
}

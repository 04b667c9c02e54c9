//! Record types produced by the extractor

use super::labels::{CanonicalLabel, LabelVocabulary};
use crate::Identifier;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of catalogue entry a page describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Game,
    Dlc,
    Multiplayer,
    Unknown,
}

impl ContentType {
    /// Value written to the `content_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Dlc => "dlc",
            Self::Multiplayer => "multiplayer",
            Self::Unknown => "unknown",
        }
    }

    pub fn all() -> [ContentType; 4] {
        [Self::Game, Self::Dlc, Self::Multiplayer, Self::Unknown]
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "game" => Ok(Self::Game),
            "dlc" => Ok(Self::Dlc),
            "multiplayer" => Ok(Self::Multiplayer),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

/// Release date with whatever precision the page offered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDate {
    Unknown,
    Year(i32),
    YearMonth(i32, u32),
    FullDate(i32, u32, u32),
}

impl ReleaseDate {
    /// Value written to the `release_precision` column
    pub fn precision(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Year(_) => "year",
            Self::YearMonth(..) => "month",
            Self::FullDate(..) => "day",
        }
    }

    pub fn year(&self) -> Option<i32> {
        match *self {
            Self::Unknown => None,
            Self::Year(y) | Self::YearMonth(y, _) | Self::FullDate(y, _, _) => Some(y),
        }
    }

    pub fn month(&self) -> Option<u32> {
        match *self {
            Self::YearMonth(_, m) | Self::FullDate(_, m, _) => Some(m),
            _ => None,
        }
    }

    pub fn day(&self) -> Option<u32> {
        match *self {
            Self::FullDate(_, _, d) => Some(d),
            _ => None,
        }
    }
}

/// One completion-time statistic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionTime {
    /// Average time in hours
    pub hours: f64,

    /// Number of users the average was polled from (0 when not shown)
    pub polled_users: u32,
}

/// Completion times keyed by normalized label
///
/// Keys are [`CanonicalLabel`]s, which can only come out of a
/// [`LabelVocabulary`], so two spellings of one statistic cannot coexist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionTimes(BTreeMap<CanonicalLabel, CompletionTime>);

impl CompletionTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `raw_label` and stores the time, replacing any earlier
    /// value for the same statistic
    pub fn insert(&mut self, vocabulary: &LabelVocabulary, raw_label: &str, time: CompletionTime) {
        self.0.insert(vocabulary.normalize(raw_label), time);
    }

    /// Stores a time under an already normalized label
    pub fn insert_canonical(&mut self, label: CanonicalLabel, time: CompletionTime) {
        self.0.insert(label, time);
    }

    pub fn get(&self, label: &str) -> Option<&CompletionTime> {
        self.0
            .iter()
            .find(|(key, _)| key.as_str() == label)
            .map(|(_, time)| time)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalLabel, &CompletionTime)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One extracted page
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Identifier,
    pub title: String,
    pub content_type: ContentType,
    pub completion_times: CompletionTimes,
    pub release_date: ReleaseDate,

    /// URL the page was fetched from
    pub source_url: String,
}

//! Completion-time label vocabulary
//!
//! Source pages phrase the same statistic in several ways ("Co-Op",
//! "co op", "Coop"). Every label is folded and looked up in a synonym table
//! before it is stored, so a record never holds two spellings of the same
//! statistic. Labels missing from the table pass through in folded form.

use crate::ConfigError;
use std::collections::HashMap;
use std::fmt;

pub const MAIN_STORY: &str = "main_story";
pub const MAIN_PLUS_SIDES: &str = "main_plus_sides";
pub const COMPLETIONIST: &str = "completionist";
pub const ALL_STYLES: &str = "all_styles";
pub const SINGLE_PLAYER: &str = "single_player";
pub const CO_OP: &str = "co_op";
pub const VERSUS: &str = "versus";

/// Canonical labels that get dedicated output columns, in column order
pub const KNOWN_LABELS: [&str; 7] = [
    MAIN_STORY,
    MAIN_PLUS_SIDES,
    COMPLETIONIST,
    ALL_STYLES,
    SINGLE_PLAYER,
    CO_OP,
    VERSUS,
];

/// Built-in synonyms, keyed by folded source spelling
const BUILTIN_SYNONYMS: &[(&str, &str)] = &[
    ("main story", MAIN_STORY),
    ("main + sides", MAIN_PLUS_SIDES),
    ("main + extras", MAIN_PLUS_SIDES),
    ("main+sides", MAIN_PLUS_SIDES),
    ("main+extras", MAIN_PLUS_SIDES),
    ("completionist", COMPLETIONIST),
    ("all styles", ALL_STYLES),
    ("all playstyles", ALL_STYLES),
    ("single player", SINGLE_PLAYER),
    ("singleplayer", SINGLE_PLAYER),
    ("solo", SINGLE_PLAYER),
    ("co op", CO_OP),
    ("coop", CO_OP),
    ("competitive", VERSUS),
    ("vs.", VERSUS),
    ("vs", VERSUS),
    ("versus", VERSUS),
];

/// A label that has been through [`LabelVocabulary::normalize`]
///
/// There is no public constructor from a raw string, so a
/// [`CompletionTimes`](super::CompletionTimes) map can only ever be keyed by
/// normalized labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalLabel(String);

impl CanonicalLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this label has a dedicated output column
    pub fn is_known(&self) -> bool {
        KNOWN_LABELS.contains(&self.0.as_str())
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Folds a raw label: lowercase, `-`/`_`/NBSP become spaces, whitespace
/// collapsed and trimmed
pub fn fold(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let spaced: String = lowered
        .chars()
        .map(|c| match c {
            '-' | '_' | '\u{a0}' => ' ',
            other => other,
        })
        .collect();

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns a synonym target into its stored key form (`"Co Op"` -> `"co_op"`)
fn target_key(target: &str) -> String {
    fold(target).replace(' ', "_")
}

/// Synonym table mapping folded source labels to canonical keys
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    synonyms: HashMap<String, String>,
}

impl LabelVocabulary {
    /// Vocabulary with only the built-in synonyms
    pub fn builtin() -> Self {
        let mut synonyms = HashMap::new();
        for (source, target) in BUILTIN_SYNONYMS {
            synonyms.insert(fold(source), (*target).to_string());
        }
        for target in KNOWN_LABELS {
            synonyms.insert(fold(target), target.to_string());
        }
        Self { synonyms }
    }

    /// Builds a vocabulary from the built-in table plus configured synonyms
    ///
    /// Configured entries win over built-in ones. Every target also maps to
    /// itself so that normalizing a canonical label is a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(LabelVocabulary)` - Consistent vocabulary
    /// * `Err(ConfigError)` - A target is empty, or a target's own spelling
    ///   is remapped to a different target (normalization would not be
    ///   idempotent)
    pub fn with_synonyms<'a, I>(extra: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut vocabulary = Self::builtin();
        let mut targets: Vec<String> = KNOWN_LABELS.iter().map(|t| t.to_string()).collect();

        for (source, target) in extra {
            let key = target_key(target);
            if key.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "label synonym '{}' has an empty target",
                    source
                )));
            }
            vocabulary.synonyms.insert(fold(source), key.clone());
            targets.push(key);
        }

        for target in &targets {
            let folded = fold(target);
            match vocabulary.synonyms.get(&folded) {
                Some(existing) if existing != target => {
                    return Err(ConfigError::Validation(format!(
                        "label '{}' is both a synonym target and remapped to '{}'",
                        target, existing
                    )));
                }
                Some(_) => {}
                None => {
                    vocabulary.synonyms.insert(folded, target.clone());
                }
            }
        }

        Ok(vocabulary)
    }

    /// Normalizes a raw source label
    ///
    /// Idempotent: `normalize(normalize(x).as_str()) == normalize(x)`.
    pub fn normalize(&self, raw: &str) -> CanonicalLabel {
        let folded = fold(raw);
        match self.synonyms.get(&folded) {
            Some(canonical) => CanonicalLabel(canonical.clone()),
            None => CanonicalLabel(folded),
        }
    }

    /// True if `raw` is a built-in or configured spelling of some label
    pub fn recognizes(&self, raw: &str) -> bool {
        self.synonyms.contains_key(&fold(raw))
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

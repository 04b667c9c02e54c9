use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Page anchors. Class names carry a build hash suffix, so match on the prefix.
selector!(PAGE_TITLE, "title");
selector!(GAME_HEADER, "[class*='GameHeader_profile_header']");
selector!(LD_JSON, "script[type='application/ld+json']");
selector!(PROFILE_INFO, "div[class*='GameSummary_profile_info']");
selector!(TIME_TABLE, "table[class*='GameTimeTable_game_main_table']");
selector!(TABLE_SECTION, "thead td");
selector!(TABLE_ROW, "tbody tr");
selector!(CELL, "td");
selector!(GAME_STATS, "div[class*='GameStats_game_times']");
selector!(STATS_ITEM, "li");
selector!(STATS_LABEL, "h4");
selector!(STATS_VALUE, "h5");

// Hours text
regex!(RANGE_SPLIT, r"\s*[-–—]\s*");
regex!(HALF_HOURS, r"^(\d+)\s*½\s*h(?:ours?)?\b");
regex!(ONLY_HALF_HOURS, r"^½\s*h(?:ours?)?\b");
regex!(HOURS_MINUTES, r"^(\d+)\s*h\s*(\d+)\s*m\b");
regex!(MINUTES, r"^(\d+)\s*(?:m|mins?|minutes?)\b");
regex!(HOURS, r"^(\d+(?:\.\d+)?)\s*h(?:ours?|rs?)?\b");
regex!(COUNT, r"(\d[\d,]*(?:\.\d+)?)\s*([kK])?");

// Release dates, e.g. "NA: March 3rd, 2017", "EU: June 2004", "JP: 1998"
regex!(
    FULL_DATE,
    r"(?i)[A-Z]{2,3}:\s*([A-Z]+)\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})"
);
regex!(MONTH_DATE, r"(?i)[A-Z]{2,3}:\s*([A-Z]+)\s+(\d{4})\b");
regex!(YEAR_DATE, r"[A-Z]{2,3}:\s*(\d{4})\b");

//! Release-date parsing with graceful precision fallback

use super::record::ReleaseDate;
use super::selectors::{FULL_DATE, MONTH_DATE, YEAR_DATE};
use chrono::NaiveDate;

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Picks the most precise release date found in the given text blocks
///
/// Every block is tried for a full date first, then year and month, then
/// a bare year. A full date that is not on the calendar (e.g. February 30)
/// still contributes its year and month. Never fails: no match at all is
/// [`ReleaseDate::Unknown`].
pub fn parse_release_date<S: AsRef<str>>(texts: &[S]) -> ReleaseDate {
    let mut degraded = None;

    for text in texts {
        for caps in FULL_DATE.captures_iter(text.as_ref()) {
            let Some(month) = month_number(&caps[1]) else {
                continue;
            };
            let (Ok(day), Ok(year)) = (caps[2].parse::<u32>(), caps[3].parse::<i32>()) else {
                continue;
            };

            if NaiveDate::from_ymd_opt(year, month, day).is_some() {
                return ReleaseDate::FullDate(year, month, day);
            }
            degraded.get_or_insert(ReleaseDate::YearMonth(year, month));
        }
    }

    if let Some(date) = degraded {
        return date;
    }

    for text in texts {
        for caps in MONTH_DATE.captures_iter(text.as_ref()) {
            if let (Some(month), Ok(year)) = (month_number(&caps[1]), caps[2].parse::<i32>()) {
                return ReleaseDate::YearMonth(year, month);
            }
        }
    }

    for text in texts {
        if let Some(caps) = YEAR_DATE.captures(text.as_ref()) {
            if let Ok(year) = caps[1].parse::<i32>() {
                return ReleaseDate::Year(year);
            }
        }
    }

    ReleaseDate::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_date() {
        assert_eq!(
            parse_release_date(&["NA: March 3rd, 2017"]),
            ReleaseDate::FullDate(2017, 3, 3)
        );
        assert_eq!(
            parse_release_date(&["Developer: Valve", "EU: October 10, 2007"]),
            ReleaseDate::FullDate(2007, 10, 10)
        );
    }

    #[test]
    fn test_year_and_month() {
        assert_eq!(
            parse_release_date(&["JP: June 2004"]),
            ReleaseDate::YearMonth(2004, 6)
        );
    }

    #[test]
    fn test_year_only() {
        assert_eq!(parse_release_date(&["NA: 1998"]), ReleaseDate::Year(1998));
    }

    #[test]
    fn test_no_date() {
        assert_eq!(
            parse_release_date(&["Publisher: Nobody"]),
            ReleaseDate::Unknown
        );
        assert_eq!(parse_release_date::<&str>(&[]), ReleaseDate::Unknown);
    }

    #[test]
    fn test_impossible_day_degrades() {
        assert_eq!(
            parse_release_date(&["NA: February 30, 2020"]),
            ReleaseDate::YearMonth(2020, 2)
        );
    }

    #[test]
    fn test_prefers_precision_over_order() {
        assert_eq!(
            parse_release_date(&["JP: 1999", "NA: May 5, 2000"]),
            ReleaseDate::FullDate(2000, 5, 5)
        );
    }

    #[test]
    fn test_unknown_month_name() {
        assert_eq!(
            parse_release_date(&["NA: Smarch 12, 2001"]),
            ReleaseDate::Unknown
        );
    }
}

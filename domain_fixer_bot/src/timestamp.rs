//! Dates, times and timezones for the `/timestamp` family of commands.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::{Tz, TZ_VARIANTS};

/// Most timezone suggestions to give at once.
pub const MAX_TIMEZONE_SUGGESTIONS: usize = 25;

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%I:%M%p"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d %B %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

fn parse_time(text: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Parse a user supplied time and/or date, in any order, as local time in `tz`.
///
/// Empty input (or `now`) means `now`. A missing date means today in `tz`,
/// a missing time means midnight. Returns [`None`] if nothing fits, or if the
/// time doesn't exist in `tz` (skipped over by a DST change).
#[must_use]
pub fn parse_date_time(input: &str, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
    let local_now = now.with_timezone(&tz);
    let words: Vec<&str> = input.split_whitespace().collect();

    if words.is_empty() || (words.len() == 1 && words[0].eq_ignore_ascii_case("now")) {
        return Some(local_now);
    }

    // Try every way of cutting the words into a time part and a date part.
    for split_at in 0..=words.len() {
        let first = words[..split_at].join(" ");
        let second = words[split_at..].join(" ");

        for (time, date) in [(&first, &second), (&second, &first)] {
            let time = if time.is_empty() {
                NaiveTime::MIN
            } else {
                let Some(time) = parse_time(time) else {
                    continue;
                };
                time
            };
            let date = if date.is_empty() {
                local_now.date_naive()
            } else {
                let Some(date) = parse_date(date) else {
                    continue;
                };
                date
            };

            if let Some(result) = tz.from_local_datetime(&date.and_time(time)).earliest() {
                return Some(result);
            }
        }
    }

    None
}

/// Find a timezone by its exact name, ignoring ASCII case.
#[must_use]
pub fn resolve_timezone(name: &str) -> Option<Tz> {
    let name = name.trim();
    TZ_VARIANTS
        .iter()
        .copied()
        .find(|tz| tz.name().eq_ignore_ascii_case(name))
}

/// Names of timezones that contain `query`, ignoring case. At most
/// [`MAX_TIMEZONE_SUGGESTIONS`] of them.
#[must_use]
pub fn find_timezones(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_lowercase();
    TZ_VARIANTS
        .iter()
        .map(|tz| tz.name())
        .filter(|name| name.to_lowercase().contains(&query))
        .take(MAX_TIMEZONE_SUGGESTIONS)
        .collect()
}

/// The ways a timestamp can be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampStyle {
    LongDateTime,
    ShortDateTime,
    LongDate,
    ShortDate,
    ShortTime,
    LongTime,
    Relative,
}

impl TimestampStyle {
    pub const ALL: [TimestampStyle; 7] = [
        Self::LongDateTime,
        Self::ShortDateTime,
        Self::LongDate,
        Self::ShortDate,
        Self::ShortTime,
        Self::LongTime,
        Self::Relative,
    ];

    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::LongDateTime => 'F',
            Self::ShortDateTime => 'f',
            Self::LongDate => 'D',
            Self::ShortDate => 'd',
            Self::ShortTime => 't',
            Self::LongTime => 'T',
            Self::Relative => 'R',
        }
    }

    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|x| x.letter() == letter)
    }

    /// Example of what this style looks like.
    #[must_use]
    pub fn example(self) -> &'static str {
        match self {
            Self::LongDateTime => "Monday, 1 March 2021, 23:50",
            Self::ShortDateTime => "1 March 2021, 23:50",
            Self::LongDate => "1 March 2021",
            Self::ShortDate => "01.03.2021",
            Self::ShortTime => "23:50",
            Self::LongTime => "23:50:55",
            Self::Relative => "2 hours ago",
        }
    }

    /// Render a moment in this style. `now` is only used by [`Self::Relative`].
    #[must_use]
    pub fn render<T: TimeZone>(self, moment: &DateTime<T>, now: DateTime<Utc>) -> String
    where
        T::Offset: std::fmt::Display,
    {
        let format = match self {
            Self::LongDateTime => "%A, %-d %B %Y, %H:%M",
            Self::ShortDateTime => "%-d %B %Y, %H:%M",
            Self::LongDate => "%-d %B %Y",
            Self::ShortDate => "%d.%m.%Y",
            Self::ShortTime => "%H:%M",
            Self::LongTime => "%H:%M:%S",
            Self::Relative => return relative(moment.timestamp(), now.timestamp()),
        };
        moment.format(format).to_string()
    }
}

/// Describe how far `then` is from `now`, like "in 3 days" or "2 hours ago".
#[must_use]
pub fn relative(then: i64, now: i64) -> String {
    const UNITS: &[(u64, &str)] = &[
        (365 * 24 * 60 * 60, "year"),
        (30 * 24 * 60 * 60, "month"),
        (24 * 60 * 60, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
        (1, "second"),
    ];

    let delta = then.saturating_sub(now);
    let distance = delta.unsigned_abs();
    if distance == 0 {
        return "now".to_string();
    }

    let (size, name) = UNITS
        .iter()
        .copied()
        .find(|(size, _)| distance >= *size)
        .unwrap_or((1, "second"));
    let count = distance / size;
    let plural = if count == 1 { "" } else { "s" };

    if delta > 0 {
        format!("in {count} {name}{plural}")
    } else {
        format!("{count} {name}{plural} ago")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn utc(timestamp: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(timestamp, 0).unwrap()
    }

    // 2021-03-01 00:00:00 UTC
    const MARCH_FIRST: i64 = 1_614_556_800;

    #[test]
    fn time_and_date_in_either_order() {
        let berlin = resolve_timezone("Europe/Berlin").unwrap();
        let now = utc(MARCH_FIRST);
        // Berlin is UTC+1 in March.
        let expected = MARCH_FIRST + 22 * 3600 + 50 * 60;
        for input in [
            "23:50 01.03.2021",
            "01.03.2021 23:50",
            "23:50 2021-03-01",
            "11:50 PM 1 March 2021",
            "1 March 2021   23:50:00",
        ] {
            let parsed = parse_date_time(input, berlin, now).unwrap();
            assert_eq!(parsed.timestamp(), expected, "{input}");
        }
    }

    #[test]
    fn missing_parts() {
        let now = utc(MARCH_FIRST + 20 * 3600);

        // Date alone is midnight.
        let parsed = parse_date_time("2021-03-01", Tz::UTC, now).unwrap();
        assert_eq!(parsed.timestamp(), MARCH_FIRST);

        // Time alone is today, and "today" is in the given timezone.
        // It's 05:00 on March 2nd in Tokyo.
        let tokyo = resolve_timezone("asia/tokyo").unwrap();
        let parsed = parse_date_time("12:00", tokyo, now).unwrap();
        assert_eq!(parsed.timestamp(), MARCH_FIRST + 86400 + 3 * 3600);

        // Nothing at all is now.
        assert_eq!(parse_date_time("", tokyo, now).unwrap().timestamp(), now.timestamp());
        assert_eq!(parse_date_time(" now ", tokyo, now).unwrap().timestamp(), now.timestamp());
    }

    #[test]
    fn garbage_is_rejected() {
        let now = utc(MARCH_FIRST);
        for input in ["banana", "25:00", "12:00 banana", "31.02.2021", "12:00 13:00"] {
            assert_eq!(parse_date_time(input, Tz::UTC, now), None, "{input}");
        }
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        let berlin = resolve_timezone("Europe/Berlin").unwrap();
        // Clocks jump from 02:00 to 03:00 on this day.
        assert_eq!(
            parse_date_time("02:30 2021-03-28", berlin, utc(MARCH_FIRST)),
            None
        );
    }

    #[test]
    fn timezone_lookup() {
        assert_eq!(resolve_timezone("EUROPE/BERLIN"), Some(Tz::Europe__Berlin));
        assert_eq!(resolve_timezone("Europe/Nowhere"), None);

        let found = find_timezones("berl");
        assert_eq!(found, vec!["Europe/Berlin"]);

        let found = find_timezones("america");
        assert_eq!(found.len(), MAX_TIMEZONE_SUGGESTIONS);
        assert!(found.iter().all(|x| x.to_lowercase().contains("america")));

        assert!(find_timezones("definitely not a timezone").is_empty());
    }

    #[test]
    fn rendering_styles() {
        let moment = utc(MARCH_FIRST + 23 * 3600 + 50 * 60 + 55);
        let now = utc(MARCH_FIRST + 23 * 3600 + 50 * 60 + 55 + 2 * 3600);
        let rendered: Vec<String> = TimestampStyle::ALL
            .into_iter()
            .map(|style| style.render(&moment, now))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "Monday, 1 March 2021, 23:50",
                "1 March 2021, 23:50",
                "1 March 2021",
                "01.03.2021",
                "23:50",
                "23:50:55",
                "2 hours ago",
            ]
        );
    }

    #[test]
    fn letters_round_trip() {
        let letters: String = TimestampStyle::ALL.iter().map(|x| x.letter()).collect();
        assert_eq!(letters, "FfDdtTR");
        assert_eq!(TimestampStyle::from_letter('R'), Some(TimestampStyle::Relative));
        assert_eq!(TimestampStyle::from_letter('x'), None);
    }

    #[test]
    fn relative_wording() {
        assert_eq!(relative(100, 100), "now");
        assert_eq!(relative(101, 100), "in 1 second");
        assert_eq!(relative(0, 3 * 86400), "3 days ago");
        assert_eq!(relative(2 * 365 * 86400, 0), "in 2 years");
        assert_eq!(relative(0, 90 * 60), "1 hour ago");
    }
}

use chrono::{Datelike, NaiveDate, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest textual form, e.g. `-9999M12`.
pub const TIME_PERIOD_TEXT_LEN: usize = 12;

lazy_static! {
    static ref PERIOD: Regex = Regex::new(r"^(-?\d{4})(?:([QMW])(\d{1,2}))?$").expect("static regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodPart {
    Year,
    Quarter(u8),
    Month(u8),
    /// ISO week
    Week(u8),
}

/// A calendar period stored as text: `2024`, `2024Q2`, `2024M03`, `2024W12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    year: i32,
    part: PeriodPart,
}

impl TimePeriod {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            part: PeriodPart::Year,
        }
    }

    pub fn quarter(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self {
            year,
            part: PeriodPart::Quarter(quarter),
        })
    }

    pub fn month(year: i32, month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self {
            year,
            part: PeriodPart::Month(month),
        })
    }

    pub fn week(year: i32, week: u8) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week as u32, Weekday::Mon).map(|_| Self {
            year,
            part: PeriodPart::Week(week),
        })
    }

    pub fn part(&self) -> PeriodPart {
        self.part
    }

    pub fn year_number(&self) -> i32 {
        self.year
    }

    /// First day of the period.
    pub fn start(&self) -> NaiveDate {
        let date = match self.part {
            PeriodPart::Year => NaiveDate::from_ymd_opt(self.year, 1, 1),
            PeriodPart::Quarter(q) => NaiveDate::from_ymd_opt(self.year, (q as u32 - 1) * 3 + 1, 1),
            PeriodPart::Month(m) => NaiveDate::from_ymd_opt(self.year, m as u32, 1),
            PeriodPart::Week(w) => NaiveDate::from_isoywd_opt(self.year, w as u32, Weekday::Mon),
        };
        date.unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.part {
            PeriodPart::Year => date.year() == self.year,
            PeriodPart::Quarter(q) => date.year() == self.year && (date.month0() / 3 + 1) as u8 == q,
            PeriodPart::Month(m) => date.year() == self.year && date.month() as u8 == m,
            PeriodPart::Week(w) => {
                let iso = date.iso_week();
                iso.year() == self.year && iso.week() as u8 == w
            }
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part {
            PeriodPart::Year => write!(f, "{}", self.year),
            PeriodPart::Quarter(q) => write!(f, "{}Q{}", self.year, q),
            PeriodPart::Month(m) => write!(f, "{}M{:02}", self.year, m),
            PeriodPart::Week(w) => write!(f, "{}W{:02}", self.year, w),
        }
    }
}

impl FromStr for TimePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = PERIOD
            .captures(s.trim())
            .ok_or_else(|| format!("'{}' is not a time period", s))?;
        let year: i32 = captures[1]
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let Some(kind) = captures.get(2) else {
            return Ok(Self::year(year));
        };
        let number: u8 = captures[3]
            .parse()
            .map_err(|_| format!("invalid period number in '{}'", s))?;
        let period = match kind.as_str() {
            "Q" => Self::quarter(year, number),
            "M" => Self::month(year, number),
            _ => Self::week(year, number),
        };
        period.ok_or_else(|| format!("period number out of range in '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for text in ["2024", "2024Q2", "2024M03", "2024W12"] {
            let period: TimePeriod = text.parse().unwrap();
            assert_eq!(period.to_string(), text);
        }
        assert!("2024Q5".parse::<TimePeriod>().is_err());
        assert!("2024M13".parse::<TimePeriod>().is_err());
        assert!("20X4".parse::<TimePeriod>().is_err());
    }

    #[test]
    fn test_start_and_contains() {
        let q2: TimePeriod = "2024Q2".parse().unwrap();
        assert_eq!(q2.start(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert!(q2.contains(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert!(!q2.contains(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));

        let w1 = TimePeriod::week(2025, 1).unwrap();
        assert_eq!(w1.start(), NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
        assert!(w1.contains(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }
}

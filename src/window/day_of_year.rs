//! Calendar day-of-year on a fixed 366-day calendar.
//!
//! Every month/day pair maps to the same ordinal regardless of whether the
//! sample's year is a leap year, so "03-15" is day 75 in 2019 and in 2020 alike.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of days on the reference calendar used for circular distances.
pub const YEAR_LENGTH: u32 = 366;

// Any leap year works as the reference.
const REFERENCE_YEAR: i32 = 2000;

/// A month/day position in the year, independent of any particular year.
///
/// Parsed from the `MM-DD` form used by query requests.
///
/// # Examples
///
/// ```
/// use climate_risk::DayOfYear;
///
/// let ides: DayOfYear = "03-15".parse().unwrap();
/// assert_eq!(ides.ordinal(), 75);
/// assert_eq!(ides.to_string(), "03-15");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayOfYear {
    month: u32,
    day: u32,
}

impl DayOfYear {
    /// Builds a day from month (1-12) and day of month. Feb 29 is valid.
    pub fn new(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, day).map(|_| Self { month, day })
    }

    /// The calendar day of an actual date, ignoring its year.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// 1-based ordinal on the 366-day reference calendar.
    pub fn ordinal(&self) -> u32 {
        // Constructors guarantee the date exists in the reference year.
        NaiveDate::from_ymd_opt(REFERENCE_YEAR, self.month, self.day)
            .map(|d| d.ordinal())
            .unwrap_or(1)
    }

    /// Shorter of the forward and backward gap to `other`, wrapping at the year boundary.
    ///
    /// ```
    /// use climate_risk::DayOfYear;
    ///
    /// let dec_31 = DayOfYear::new(12, 31).unwrap();
    /// let jan_2 = DayOfYear::new(1, 2).unwrap();
    /// assert_eq!(dec_31.circular_distance(&jan_2), 2);
    /// ```
    pub fn circular_distance(&self, other: &DayOfYear) -> u32 {
        circular_distance(self.ordinal(), other.ordinal())
    }
}

/// `min(|a - b|, 366 - |a - b|)` for two ordinals on the reference calendar.
pub fn circular_distance(a: u32, b: u32) -> u32 {
    let gap = a.abs_diff(b) % YEAR_LENGTH;
    gap.min(YEAR_LENGTH - gap)
}

/// Error returned when a string is not a valid `MM-DD` day of year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDayOfYearError(pub String);

impl fmt::Display for ParseDayOfYearError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid MM-DD day of year", self.0)
    }
}

impl std::error::Error for ParseDayOfYearError {}

impl FromStr for DayOfYear {
    type Err = ParseDayOfYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDayOfYearError(s.to_string());
        let (month, day) = s.trim().split_once('-').ok_or_else(err)?;
        if month.len() != 2 || day.len() != 2 {
            return Err(err());
        }
        let month: u32 = month.parse().map_err(|_| err())?;
        let day: u32 = day.parse().map_err(|_| err())?;
        DayOfYear::new(month, day).ok_or_else(err)
    }
}

impl TryFrom<String> for DayOfYear {
    type Error = ParseDayOfYearError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayOfYear> for String {
    fn from(value: DayOfYear) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DayOfYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

//! Registry dates with explicit precision.
//!
//! Cancer registry exports use `DD.MM.YYYY` and encode an unknown day or month as `00`
//! (`00.03.2021`, `00.00.2021`). The date keeps that precision so the FHIR rendering does not
//! invent a day that was never reported.

use chrono::{Datelike, NaiveDate};
use std::fmt;

/// Errors returned when parsing a [`ReportDate`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DateError {
    #[error("unrecognised date format: '{0}'")]
    Format(String),

    #[error("date out of range: '{0}'")]
    OutOfRange(String),
}

/// How much of a [`ReportDate`] is actually known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

/// A calendar date as reported by the registry.
///
/// Ordering compares the first day of the reported period, then precision, so
/// `2021-03` sorts before `2021-03-05` and after `2021-02-28`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportDate {
    date: NaiveDate,
    precision: DatePrecision,
}

impl ReportDate {
    /// A fully known date.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| DateError::OutOfRange(format!("{year:04}-{month:02}-{day:02}")))?;
        Ok(Self {
            date,
            precision: DatePrecision::Day,
        })
    }

    /// Parse a registry (`DD.MM.YYYY`) or ISO (`YYYY[-MM[-DD]]`) date.
    ///
    /// # Errors
    ///
    /// Returns [`DateError::Format`] for unrecognised shapes and [`DateError::OutOfRange`] for
    /// impossible dates such as `31.02.2021`. A known day with an unknown month is rejected.
    pub fn parse(input: &str) -> Result<Self, DateError> {
        let trimmed = input.trim();
        let parts: Vec<&str> = if trimmed.contains('.') {
            let mut parts: Vec<&str> = trimmed.split('.').collect();
            parts.reverse();
            parts
        } else {
            trimmed.split('-').collect()
        };

        let numbers = parts
            .iter()
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(DateError::Format(trimmed.to_string()));
                }
                p.parse::<u32>()
                    .map_err(|_| DateError::Format(trimmed.to_string()))
            })
            .collect::<Result<Vec<u32>, DateError>>()?;

        let (year, month, day) = match numbers.as_slice() {
            [y] if parts[0].len() == 4 => (*y, 0, 0),
            [y, m] if parts[0].len() == 4 => (*y, *m, 0),
            [y, m, d] if parts[0].len() == 4 => (*y, *m, *d),
            _ => return Err(DateError::Format(trimmed.to_string())),
        };

        let precision = match (month, day) {
            (0, 0) => DatePrecision::Year,
            (0, _) => return Err(DateError::Format(trimmed.to_string())),
            (_, 0) => DatePrecision::Month,
            _ => DatePrecision::Day,
        };

        let year = i32::try_from(year).map_err(|_| DateError::OutOfRange(trimmed.to_string()))?;
        let date = NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
            .ok_or_else(|| DateError::OutOfRange(trimmed.to_string()))?;

        Ok(Self { date, precision })
    }

    pub fn precision(&self) -> DatePrecision {
        self.precision
    }

    /// Render as a FHIR `date` with the reported precision.
    pub fn to_fhir(&self) -> String {
        match self.precision {
            DatePrecision::Year => format!("{:04}", self.date.year()),
            DatePrecision::Month => format!("{:04}-{:02}", self.date.year(), self.date.month()),
            DatePrecision::Day => self.date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fhir())
    }
}

impl std::str::FromStr for ReportDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for ReportDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_fhir())
    }
}

impl<'de> serde::Deserialize<'de> for ReportDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ReportDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_format() {
        let date = ReportDate::parse("18.03.2021").expect("valid");
        assert_eq!(date.precision(), DatePrecision::Day);
        assert_eq!(date.to_fhir(), "2021-03-18");
    }

    #[test]
    fn unknown_day_and_month_reduce_precision() {
        let month = ReportDate::parse("00.03.2021").expect("valid");
        assert_eq!(month.precision(), DatePrecision::Month);
        assert_eq!(month.to_fhir(), "2021-03");

        let year = ReportDate::parse("00.00.2021").expect("valid");
        assert_eq!(year.precision(), DatePrecision::Year);
        assert_eq!(year.to_fhir(), "2021");
    }

    #[test]
    fn parses_iso_format() {
        assert_eq!(ReportDate::parse("2021-04-10").expect("valid").to_fhir(), "2021-04-10");
        assert_eq!(ReportDate::parse("2021-04").expect("valid").to_fhir(), "2021-04");
        assert_eq!(ReportDate::parse(" 2021 ").expect("valid").to_fhir(), "2021");
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(matches!(
            ReportDate::parse("31.02.2021"),
            Err(DateError::OutOfRange(_))
        ));
        assert!(matches!(
            ReportDate::parse("18.00.2021"),
            Err(DateError::Format(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        for input in ["", "yesterday", "18/03/2021", "21.03.18", "2021-3x-01"] {
            assert!(
                matches!(ReportDate::parse(input), Err(DateError::Format(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn orders_by_first_day_of_period() {
        let month = ReportDate::parse("00.03.2021").expect("valid");
        let day = ReportDate::parse("05.03.2021").expect("valid");
        let earlier = ReportDate::parse("28.02.2021").expect("valid");
        assert!(earlier < month);
        assert!(month < day);
    }
}

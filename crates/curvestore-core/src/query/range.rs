use std::fmt::{Display, Formatter};

use time::Date;

use crate::query::{format_date, Period};
use crate::ValidationError;

/// Named rolling or to-date windows resolved by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeInterval {
    RollingWeek,
    RollingMonth,
    RollingQuarter,
    RollingYear,
    WeekToDate,
    MonthToDate,
    QuarterToDate,
    YearToDate,
}

impl RelativeInterval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RollingWeek => "RollingWeek",
            Self::RollingMonth => "RollingMonth",
            Self::RollingQuarter => "RollingQuarter",
            Self::RollingYear => "RollingYear",
            Self::WeekToDate => "WeekToDate",
            Self::MonthToDate => "MonthToDate",
            Self::QuarterToDate => "QuarterToDate",
            Self::YearToDate => "YearToDate",
        }
    }
}

impl Display for RelativeInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When to extract. Each variant carries only the data it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionRange {
    /// Absolute `[start, end)` date window.
    DateRange { start: Date, end: Date },
    /// A single period relative to now.
    Period(Period),
    /// A window between two periods relative to now.
    PeriodRange { from: Period, to: Period },
    RelativeInterval(RelativeInterval),
}

impl ExtractionRange {
    pub fn date_range(start: Date, end: Date) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvertedRange {
                start: format_date(start),
                end: format_date(end),
            });
        }
        Ok(Self::DateRange { start, end })
    }

    pub const fn period(period: Period) -> Self {
        Self::Period(period)
    }

    pub const fn period_range(from: Period, to: Period) -> Self {
        Self::PeriodRange { from, to }
    }

    pub const fn relative(interval: RelativeInterval) -> Self {
        Self::RelativeInterval(interval)
    }

    /// Renders the range as it appears in extraction paths.
    pub fn path_segment(&self) -> String {
        match self {
            Self::DateRange { start, end } => {
                format!("{}/{}", format_date(*start), format_date(*end))
            }
            Self::Period(period) => period.to_string(),
            Self::PeriodRange { from, to } => format!("{from}/{to}"),
            Self::RelativeInterval(interval) => interval.to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::DateRange { start, end } if start >= end => Err(ValidationError::InvertedRange {
                start: format_date(*start),
                end: format_date(*end),
            }),
            _ => Ok(()),
        }
    }
}

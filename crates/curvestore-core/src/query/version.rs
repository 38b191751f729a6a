use time::PrimitiveDateTime;

use crate::query::{format_date_time, Period};
use crate::ValidationError;

/// Window over version timestamps used by the last-of and most-recent selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionWindow {
    DateTimeRange {
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    },
    Period(Period),
    PeriodRange {
        from: Period,
        to: Period,
    },
}

impl VersionWindow {
    pub fn date_time_range(
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Self, ValidationError> {
        let window = Self::DateTimeRange { start, end };
        window.validate()?;
        Ok(window)
    }

    fn path_segment(&self) -> String {
        match self {
            Self::DateTimeRange { start, end } => {
                format!("{}/{}", format_date_time(*start), format_date_time(*end))
            }
            Self::Period(period) => period.to_string(),
            Self::PeriodRange { from, to } => format!("{from}/{to}"),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::DateTimeRange { start, end } if start >= end => {
                Err(ValidationError::InvertedRange {
                    start: format_date_time(*start),
                    end: format_date_time(*end),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Which historical version of a versioned curve to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSelection {
    /// The last `n` versions.
    LastN(u32),
    /// Most updated value per timestamp, optionally ignoring versions after the limit.
    Muv {
        version_limit: Option<PrimitiveDateTime>,
    },
    LastOfDays(VersionWindow),
    LastOfMonths(VersionWindow),
    /// One explicit version.
    Version(PrimitiveDateTime),
    MostRecent(VersionWindow),
}

impl VersionSelection {
    pub fn last_n(n: u32) -> Result<Self, ValidationError> {
        if n == 0 {
            return Err(ValidationError::ZeroLastN);
        }
        Ok(Self::LastN(n))
    }

    pub const fn muv() -> Self {
        Self::Muv {
            version_limit: None,
        }
    }

    pub fn path_segment(&self) -> String {
        match self {
            Self::LastN(n) => format!("Last{n}"),
            Self::Muv { .. } => String::from("MUV"),
            Self::LastOfDays(window) => format!("LastOfDays/{}", window.path_segment()),
            Self::LastOfMonths(window) => format!("LastOfMonths/{}", window.path_segment()),
            Self::Version(version) => format!("Version/{}", format_date_time(*version)),
            Self::MostRecent(window) => format!("MostRecent/{}", window.path_segment()),
        }
    }

    pub fn version_limit(&self) -> Option<PrimitiveDateTime> {
        match self {
            Self::Muv { version_limit } => *version_limit,
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::LastN(0) => Err(ValidationError::ZeroLastN),
            Self::LastOfDays(window) | Self::LastOfMonths(window) | Self::MostRecent(window) => {
                window.validate()
            }
            _ => Ok(()),
        }
    }
}

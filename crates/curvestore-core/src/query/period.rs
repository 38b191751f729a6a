use std::fmt::{Display, Formatter, Write as _};
use std::str::FromStr;

use crate::ValidationError;

/// Signed ISO-8601 calendar period such as `P1M`, `P-5D` or `PT15M`.
///
/// Components are kept as written; rendering drops zero components and falls
/// back to `P0D` for an all-zero period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Period {
    pub years: i32,
    pub months: i32,
    pub weeks: i32,
    pub days: i32,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
}

const DATE_UNITS: [char; 4] = ['Y', 'M', 'W', 'D'];
const TIME_UNITS: [char; 3] = ['H', 'M', 'S'];

impl Period {
    pub const fn days(days: i32) -> Self {
        Self {
            years: 0,
            months: 0,
            weeks: 0,
            days,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    pub const fn months(months: i32) -> Self {
        Self {
            years: 0,
            months,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    pub const fn years(years: i32) -> Self {
        Self {
            years,
            months: 0,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidPeriod {
            value: input.to_owned(),
        };

        let body = input.trim().strip_prefix('P').ok_or_else(invalid)?;
        let (date_part, time_part) = match body.split_once('T') {
            Some((date, time)) if !time.is_empty() => (date, Some(time)),
            Some(_) => return Err(invalid()),
            None => (body, None),
        };

        let mut period = Self::default();
        let mut seen = 0usize;

        for (unit, amount) in components(date_part, &DATE_UNITS).ok_or_else(invalid)? {
            match unit {
                'Y' => period.years = amount,
                'M' => period.months = amount,
                'W' => period.weeks = amount,
                _ => period.days = amount,
            }
            seen += 1;
        }

        if let Some(time_part) = time_part {
            for (unit, amount) in components(time_part, &TIME_UNITS).ok_or_else(invalid)? {
                match unit {
                    'H' => period.hours = amount,
                    'M' => period.minutes = amount,
                    _ => period.seconds = amount,
                }
                seen += 1;
            }
        }

        if seen == 0 {
            return Err(invalid());
        }

        Ok(period)
    }

    fn has_time(&self) -> bool {
        self.hours != 0 || self.minutes != 0 || self.seconds != 0
    }
}

/// Splits `-1Y2M` style text into `(unit, amount)` pairs, enforcing unit order.
fn components(text: &str, units: &[char]) -> Option<Vec<(char, i32)>> {
    let mut parsed = Vec::new();
    let mut next_unit = 0usize;
    let mut number = String::new();

    for ch in text.chars() {
        if ch.is_ascii_digit() || (ch == '-' && number.is_empty()) {
            number.push(ch);
            continue;
        }

        let position = units[next_unit..].iter().position(|unit| *unit == ch)?;
        if number.is_empty() || number == "-" {
            return None;
        }
        let amount = number.parse::<i32>().ok()?;
        parsed.push((ch, amount));
        next_unit += position + 1;
        number.clear();
    }

    if number.is_empty() {
        Some(parsed)
    } else {
        None
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut rendered = String::from("P");
        for (amount, unit) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if amount != 0 {
                write!(rendered, "{amount}{unit}")?;
            }
        }

        if self.has_time() {
            rendered.push('T');
            for (amount, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if amount != 0 {
                    write!(rendered, "{amount}{unit}")?;
                }
            }
        }

        if rendered == "P" {
            rendered.push_str("0D");
        }

        f.write_str(&rendered)
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

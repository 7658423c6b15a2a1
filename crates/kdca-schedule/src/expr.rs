//! Calendar field expressions.
//!
//! A field holds one or more comma-separated terms. Each term is a stepped
//! inclusive range over the field's natural bounds, or `last` for the last
//! day of the month.

use crate::error::{ScheduleError, ScheduleResult};
use crate::spec::FieldValue;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Calendar unit, ordered from most to least significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Year,
    Month,
    Day,
    Week,
    DayOfWeek,
    Hour,
    Minute,
    Second,
}

impl FieldKind {
    /// All fields in significance order.
    pub const ALL: [FieldKind; 8] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Week,
        Self::DayOfWeek,
        Self::Hour,
        Self::Minute,
        Self::Second,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Week => "week",
            Self::DayOfWeek => "day_of_week",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    pub fn min(&self) -> u32 {
        match self {
            Self::Year => 1970,
            Self::Month | Self::Day | Self::Week => 1,
            Self::DayOfWeek | Self::Hour | Self::Minute | Self::Second => 0,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            Self::Year => 9999,
            Self::Month => 12,
            Self::Day => 31,
            Self::Week => 53,
            Self::DayOfWeek => 6,
            Self::Hour => 23,
            Self::Minute | Self::Second => 59,
        }
    }

    /// Expression used when the field is unset but a more significant
    /// field is populated.
    fn default_expr(&self) -> &'static str {
        match self {
            Self::Year | Self::Week | Self::DayOfWeek => "*",
            Self::Month | Self::Day => "1",
            Self::Hour | Self::Minute | Self::Second => "0",
        }
    }

    fn resolve_name(&self, token: &str) -> Option<u32> {
        let token = token.to_ascii_lowercase();
        let names: &[&str] = match self {
            Self::Month => &MONTH_NAMES,
            Self::DayOfWeek => &WEEKDAY_NAMES,
            _ => return None,
        };
        names
            .iter()
            .position(|n| *n == token)
            .map(|idx| idx as u32 + self.min())
    }
}

/// One term of a field expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    /// Values `first, first + step, ...` up to and including `last`.
    Range { first: u32, last: u32, step: u32 },
    /// Last day of the current month (`day` only).
    LastDay,
}

impl Term {
    fn matches(&self, value: u32, last_day: u32) -> bool {
        match *self {
            Self::Range { first, last, step } => {
                value >= first && value <= last && (value - first) % step == 0
            }
            Self::LastDay => value == last_day,
        }
    }

    /// Smallest matching value `>= from`.
    fn next_value(&self, from: u32, last_day: u32) -> Option<u32> {
        match *self {
            Self::Range { first, last, step } => {
                let candidate = if from <= first {
                    first
                } else {
                    let offset = (from - first).div_ceil(step) * step;
                    first.checked_add(offset)?
                };
                (candidate <= last).then_some(candidate)
            }
            Self::LastDay => (from <= last_day).then_some(last_day),
        }
    }
}

/// Parsed, validated expression for one calendar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExpr {
    kind: FieldKind,
    terms: Vec<Term>,
    is_default: bool,
}

impl FieldExpr {
    /// Parse a configured field value.
    ///
    /// # Errors
    /// Returns `ScheduleError` for malformed terms, unknown names, zero
    /// steps, inverted ranges or values outside the unit's bounds.
    pub fn parse(kind: FieldKind, value: &FieldValue) -> ScheduleResult<Self> {
        Self::parse_str(kind, &value.as_expr(), false)
    }

    /// Unrestricted field (`*`).
    pub fn wildcard(kind: FieldKind) -> Self {
        Self {
            kind,
            terms: vec![Term::Range {
                first: kind.min(),
                last: kind.max(),
                step: 1,
            }],
            is_default: true,
        }
    }

    /// Default for an unset field below the least significant populated one.
    pub fn defaulted(kind: FieldKind) -> Self {
        match Self::parse_str(kind, kind.default_expr(), true) {
            Ok(expr) => expr,
            Err(_) => Self::wildcard(kind),
        }
    }

    fn parse_str(kind: FieldKind, text: &str, is_default: bool) -> ScheduleResult<Self> {
        let invalid = |reason: &str| ScheduleError::InvalidExpression {
            field: kind.name(),
            expr: text.to_string(),
            reason: reason.to_string(),
        };

        let mut terms = Vec::new();
        for raw in text.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(invalid("empty term"));
            }
            terms.push(parse_term(kind, raw).map_err(|e| match e {
                TermError::Invalid(reason) => invalid(&reason),
                TermError::Range(err) => err,
            })?);
        }

        Ok(Self {
            kind,
            terms,
            is_default,
        })
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether the field came from defaulting rather than configuration.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Check a value. `last_day` is only consulted by `last` terms.
    pub fn matches(&self, value: u32, last_day: u32) -> bool {
        self.terms.iter().any(|t| t.matches(value, last_day))
    }

    /// Smallest matching value `>= from`, if any.
    pub fn next_value(&self, from: u32, last_day: u32) -> Option<u32> {
        self.terms
            .iter()
            .filter_map(|t| t.next_value(from, last_day))
            .min()
    }
}

enum TermError {
    Invalid(String),
    Range(ScheduleError),
}

fn parse_term(kind: FieldKind, raw: &str) -> Result<Term, TermError> {
    if raw.eq_ignore_ascii_case("last") {
        return if kind == FieldKind::Day {
            Ok(Term::LastDay)
        } else {
            Err(TermError::Invalid("`last` is only valid for day".into()))
        };
    }

    let (base, step) = match raw.split_once('/') {
        Some((base, step)) => {
            let step: u32 = step
                .trim()
                .parse()
                .map_err(|_| TermError::Invalid(format!("invalid step {step:?}")))?;
            if step == 0 {
                return Err(TermError::Invalid("step must be positive".into()));
            }
            (base.trim(), Some(step))
        }
        None => (raw, None),
    };

    let (first, last) = if base == "*" {
        (kind.min(), kind.max())
    } else if let Some((a, b)) = base.split_once('-') {
        let first = parse_value(kind, a.trim())?;
        let last = parse_value(kind, b.trim())?;
        if first > last {
            return Err(TermError::Invalid(format!(
                "range start {first} is after end {last}"
            )));
        }
        (first, last)
    } else {
        let first = parse_value(kind, base)?;
        // `a/n` runs to the end of the unit, a bare `a` is a single value
        let last = if step.is_some() { kind.max() } else { first };
        (first, last)
    };

    Ok(Term::Range {
        first,
        last,
        step: step.unwrap_or(1),
    })
}

fn parse_value(kind: FieldKind, token: &str) -> Result<u32, TermError> {
    let value = match token.parse::<u32>() {
        Ok(v) => v,
        Err(_) => kind
            .resolve_name(token)
            .ok_or_else(|| TermError::Invalid(format!("unrecognized value {token:?}")))?,
    };

    if value < kind.min() || value > kind.max() {
        return Err(TermError::Range(ScheduleError::OutOfRange {
            field: kind.name(),
            value,
            min: kind.min(),
            max: kind.max(),
        }));
    }
    Ok(value)
}

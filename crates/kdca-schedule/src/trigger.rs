//! Cron trigger: computes successive fire times from a [`ScheduleSpec`].
//!
//! Works on naive wall-clock time with one-second granularity. Mapping wall
//! clock to real instants (local timezone, DST) is the scheduler's job.

use crate::error::{ScheduleError, ScheduleResult};
use crate::expr::{FieldExpr, FieldKind};
use crate::spec::{FieldValue, ScheduleSpec};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Validated cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronTrigger {
    year: FieldExpr,
    month: FieldExpr,
    day: FieldExpr,
    week: FieldExpr,
    day_of_week: FieldExpr,
    hour: FieldExpr,
    minute: FieldExpr,
    second: FieldExpr,
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
}

impl CronTrigger {
    /// Validate a spec and build the trigger.
    ///
    /// # Errors
    /// Returns `ScheduleError` if any field expression is invalid or
    /// `end_date` precedes `start_date`.
    pub fn new(spec: &ScheduleSpec) -> ScheduleResult<Self> {
        if let (Some(start), Some(end)) = (spec.start_date, spec.end_date) {
            if end < start {
                return Err(ScheduleError::EndBeforeStart { start, end });
            }
        }

        let values: [Option<&FieldValue>; 8] = [
            spec.year.as_ref(),
            spec.month.as_ref(),
            spec.day.as_ref(),
            spec.week.as_ref(),
            spec.day_of_week.as_ref(),
            spec.hour.as_ref(),
            spec.minute.as_ref(),
            spec.second.as_ref(),
        ];
        let least_significant_set = values.iter().rposition(Option::is_some);

        let field = |idx: usize| -> ScheduleResult<FieldExpr> {
            let kind = FieldKind::ALL[idx];
            match (values[idx], least_significant_set) {
                (Some(value), _) => FieldExpr::parse(kind, value),
                (None, Some(last)) if idx > last => Ok(FieldExpr::defaulted(kind)),
                (None, _) => Ok(FieldExpr::wildcard(kind)),
            }
        };

        Ok(Self {
            year: field(0)?,
            month: field(1)?,
            day: field(2)?,
            week: field(3)?,
            day_of_week: field(4)?,
            hour: field(5)?,
            minute: field(6)?,
            second: field(7)?,
            start_date: spec.start_date,
            end_date: spec.end_date,
        })
    }

    /// Earliest fire time `>= now`, or `None` if the schedule is exhausted.
    ///
    /// Sub-second parts of `now` are rounded up to the next whole second.
    pub fn next_fire_time(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = ceil_to_second(now)?;
        if let Some(start) = self.start_date {
            if t < start {
                t = ceil_to_second(start)?;
            }
        }

        loop {
            if let Some(end) = self.end_date {
                if t > end {
                    return None;
                }
            }

            let year = u32::try_from(t.year()).ok()?;
            match self.year.next_value(year, 0) {
                None => return None,
                Some(y) if y != year => {
                    t = start_of_month(y, 1)?;
                    continue;
                }
                Some(_) => {}
            }

            match self.month.next_value(t.month(), 0) {
                None => {
                    t = start_of_month(year + 1, 1)?;
                    continue;
                }
                Some(m) if m != t.month() => {
                    t = start_of_month(year, m)?;
                    continue;
                }
                Some(_) => {}
            }

            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_time(NaiveTime::MIN);
                continue;
            }

            match self.hour.next_value(t.hour(), 0) {
                None => {
                    t = t.date().succ_opt()?.and_time(NaiveTime::MIN);
                    continue;
                }
                Some(h) if h != t.hour() => {
                    t = t.date().and_hms_opt(h, 0, 0)?;
                    continue;
                }
                Some(_) => {}
            }

            match self.minute.next_value(t.minute(), 0) {
                None => {
                    t = t.date().and_hms_opt(t.hour(), 0, 0)? + Duration::hours(1);
                    continue;
                }
                Some(m) if m != t.minute() => {
                    t = t.date().and_hms_opt(t.hour(), m, 0)?;
                    continue;
                }
                Some(_) => {}
            }

            match self.second.next_value(t.second(), 0) {
                None => {
                    t = t.date().and_hms_opt(t.hour(), t.minute(), 0)? + Duration::minutes(1);
                    continue;
                }
                Some(s) if s != t.second() => {
                    t = t.date().and_hms_opt(t.hour(), t.minute(), s)?;
                    continue;
                }
                Some(_) => {}
            }

            return Some(t);
        }
    }

    /// Iterator over successive fire times starting at `from`.
    pub fn fire_times(&self, from: NaiveDateTime) -> impl Iterator<Item = NaiveDateTime> + '_ {
        std::iter::successors(self.next_fire_time(from), move |prev| {
            self.next_fire_time(*prev + Duration::seconds(1))
        })
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let last_day = days_in_month(date.year(), date.month());
        self.day.matches(date.day(), last_day)
            && self.week.matches(date.iso_week().week(), 0)
            && self
                .day_of_week
                .matches(date.weekday().num_days_from_monday(), 0)
    }
}

fn ceil_to_second(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let truncated = t.with_nanosecond(0)?;
    if truncated == t {
        Some(t)
    } else {
        truncated.checked_add_signed(Duration::seconds(1))
    }
}

fn start_of_month(year: u32, month: u32) -> Option<NaiveDateTime> {
    let year = i32::try_from(year).ok()?;
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_time(NaiveTime::MIN))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

//! Schedule error types.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid expression {expr:?} for field {field}: {reason}")]
    InvalidExpression {
        field: &'static str,
        expr: String,
        reason: String,
    },

    #[error("Value {value} out of range for field {field} ({min}-{max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("end_date {end} is before start_date {start}")]
    EndBeforeStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Job already registered: {0}")]
    DuplicateJob(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

//! Declarative schedule specification.
//!
//! Pure data: a [`ScheduleSpec`] is loaded once from configuration and
//! validated by [`CronTrigger::new`](crate::CronTrigger::new).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a single calendar field.
///
/// Either a bare integer (`hour = 18`) or an expression string
/// (`minute = "5/15"`, `day_of_week = "mon-fri"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(u32),
    Expr(String),
}

impl FieldValue {
    /// Expression text as parsed by the field grammar.
    pub fn as_expr(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Expr(s) => s.trim().to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Expr(s) => f.write_str(s),
        }
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Expr(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Expr(s)
    }
}

/// Cron-style recurrence description.
///
/// Every field is optional. Fields more significant than the least
/// significant populated field are wildcards; less significant ones default
/// to their minimum, so `hour = 18, minute = 0` fires once a day at
/// 18:00:00. `week` and `day_of_week` never default.
///
/// `start_date` and `end_date` are inclusive bounds in the scheduler's
/// wall-clock timezone. Accepted formats: `2024-03-22 14:30:00`,
/// `2024-03-22T14:30:00` and `2024-03-22`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSpec {
    /// 4-digit year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<FieldValue>,
    /// Month (1-12 or jan-dec).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<FieldValue>,
    /// Day of month (1-31 or `last`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<FieldValue>,
    /// ISO week (1-53).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<FieldValue>,
    /// Day of week (0-6 or mon-sun, 0 = Monday).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<FieldValue>,
    /// Hour (0-23).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<FieldValue>,
    /// Minute (0-59).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<FieldValue>,
    /// Second (0-59).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<FieldValue>,
    /// Earliest possible fire time (inclusive).
    #[serde(default, with = "opt_datetime", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDateTime>,
    /// Latest possible fire time (inclusive).
    #[serde(default, with = "opt_datetime", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
}

impl ScheduleSpec {
    /// Once a day at `hour:minute:00`.
    pub fn daily_at(hour: u32, minute: u32) -> Self {
        Self {
            hour: Some(hour.into()),
            minute: Some(minute.into()),
            ..Self::default()
        }
    }
}

/// Lenient `Option<NaiveDateTime>` (de)serialization.
///
/// Accepts strings as well as native TOML local dates and datetimes.
mod opt_datetime {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        raw.map(|raw| {
            let text = match raw {
                Raw::Text(s) => s,
                Raw::Toml(dt) => dt.to_string(),
            };
            parse(&text).map_err(de::Error::custom)
        })
        .transpose()
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Toml(toml::value::Datetime),
    }

    pub(super) fn parse(s: &str) -> Result<NaiveDateTime, String> {
        let s = s.trim();
        NaiveDateTime::parse_from_str(s, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|e| format!("invalid datetime {s:?}: {e}"))
    }
}

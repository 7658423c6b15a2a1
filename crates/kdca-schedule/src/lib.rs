//! Cron-style scheduling for recurring jobs.
//!
//! - [`ScheduleSpec`]: Declarative, serde-loadable recurrence description
//! - [`CronTrigger`]: Validated spec that computes successive fire times
//! - [`Scheduler`]: Owned runner that invokes registered [`Job`]s one at a time
//!
//! Field expressions follow the familiar cron dialect: `*`, `*/n`, `a`,
//! `a-b`, `a/n`, `a-b/n` and comma-separated lists. `day` also accepts
//! `last`, `month` accepts `jan..dec` and `day_of_week` accepts `mon..sun`
//! (0 = Monday).

pub mod error;
pub mod expr;
pub mod scheduler;
pub mod spec;
pub mod trigger;

pub use error::{ScheduleError, ScheduleResult};
pub use expr::{FieldExpr, FieldKind};
pub use scheduler::{BoxFuture, Job, ScheduleTimezone, Scheduler};
pub use spec::{FieldValue, ScheduleSpec};
pub use trigger::CronTrigger;

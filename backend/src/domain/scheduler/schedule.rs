//! Schedule specifications accepted by the scheduler.
//!
//! Three textual forms are recognised:
//! - `@every <duration>`, for example `@every 1s`;
//! - a cron expression, recognised by having four to six spaces;
//! - a bare human duration such as `30s`, `5m` or `1h 30m`.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::SchedulerError;

const EVERY_PREFIX: &str = "@every ";

/// Parsed firing rule for a job.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    /// Fire at a fixed interval after each run.
    Every(Duration),
    /// Fire at the next instant matching a cron expression.
    Cron(Box<cron::Schedule>),
}

impl ScheduleSpec {
    /// Parse a textual schedule.
    ///
    /// Five-field cron expressions (minute precision) gain a leading seconds
    /// field of `0`; six- and seven-field expressions are used verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidSchedule`] when no form matches or
    /// the interval is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use backend::domain::ScheduleSpec;
    ///
    /// assert!(matches!(
    ///     ScheduleSpec::parse("@every 1s"),
    ///     Ok(ScheduleSpec::Every(interval)) if interval == Duration::from_secs(1)
    /// ));
    /// assert!(matches!(ScheduleSpec::parse("*/1 * * * *"), Ok(ScheduleSpec::Cron(_))));
    /// assert!(ScheduleSpec::parse("whenever").is_err());
    /// ```
    pub fn parse(spec: &str) -> Result<Self, SchedulerError> {
        let trimmed = spec.trim();
        if let Some(interval) = trimmed.strip_prefix(EVERY_PREFIX) {
            return parse_interval(spec, interval);
        }

        let spaces = trimmed.matches(' ').count();
        if (4..=6).contains(&spaces) {
            return parse_cron(spec, trimmed, spaces);
        }

        parse_interval(spec, trimmed)
    }

    /// Next firing strictly after `now`.
    ///
    /// Returns `None` when a cron expression has no further matches or an
    /// interval overflows the timestamp range.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Every(interval) => TimeDelta::from_std(*interval)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta)),
            Self::Cron(schedule) => schedule.after(&now).next(),
        }
    }
}

fn invalid(spec: &str, reason: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidSchedule {
        spec: spec.to_owned(),
        reason: reason.into(),
    }
}

fn parse_interval(spec: &str, text: &str) -> Result<ScheduleSpec, SchedulerError> {
    let interval =
        humantime::parse_duration(text.trim()).map_err(|err| invalid(spec, err.to_string()))?;
    if interval.is_zero() {
        return Err(invalid(spec, "interval must be positive"));
    }
    Ok(ScheduleSpec::Every(interval))
}

fn parse_cron(spec: &str, text: &str, spaces: usize) -> Result<ScheduleSpec, SchedulerError> {
    let expression = if spaces == 4 {
        format!("0 {text}")
    } else {
        text.to_owned()
    };
    cron::Schedule::from_str(&expression)
        .map(|schedule| ScheduleSpec::Cron(Box::new(schedule)))
        .map_err(|err| invalid(spec, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use rstest::rstest;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 30)
            .single()
            .expect("valid time")
    }

    #[rstest]
    #[case("@every 1s", 1)]
    #[case("@every 5m", 300)]
    #[case("30s", 30)]
    #[case("1h 30m", 5400)]
    fn intervals(#[case] spec: &str, #[case] seconds: u64) {
        let parsed = ScheduleSpec::parse(spec).expect("interval parses");
        assert!(
            matches!(parsed, ScheduleSpec::Every(interval) if interval == Duration::from_secs(seconds))
        );
    }

    #[rstest]
    fn five_field_cron_fires_on_the_minute() {
        let parsed = ScheduleSpec::parse("*/1 * * * *").expect("cron parses");
        let next = parsed.next_after(noon()).expect("next firing");

        assert_eq!(next.minute(), 1);
        assert_eq!(next.second(), 0);
    }

    #[rstest]
    fn six_field_cron_keeps_seconds() {
        let parsed = ScheduleSpec::parse("*/10 * * * * *").expect("cron parses");
        let next = parsed.next_after(noon()).expect("next firing");

        assert_eq!(next.second(), 40);
    }

    #[rstest]
    #[case("")]
    #[case("soon")]
    #[case("@every never")]
    #[case("0s")]
    #[case("x * * * *")]
    fn invalid_specs_are_rejected(#[case] spec: &str) {
        let error = ScheduleSpec::parse(spec).expect_err("spec is invalid");
        assert!(matches!(error, SchedulerError::InvalidSchedule { .. }));
    }

    #[rstest]
    fn interval_is_added_to_now() {
        let parsed = ScheduleSpec::parse("@every 2s").expect("interval parses");
        assert_eq!(
            parsed.next_after(noon()),
            Some(noon() + TimeDelta::seconds(2))
        );
    }
}

//! Conversion of Scrapyd timestamp strings into UTC instants.
//!
//! Scrapyd reports times as `YYYY-MM-DD HH:MM:SS.ffffff` in the daemon's local
//! zone without an offset. Only the date is trusted: the first
//! whitespace-separated token is parsed and mapped to midnight UTC.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use keeper_scrapyd_client::RawJob;
use tracing::warn;

const REMOTE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    StartTime,
    EndTime,
}

impl TimestampField {
    pub const fn name(self) -> &'static str {
        match self {
            TimestampField::StartTime => "start_time",
            TimestampField::EndTime => "end_time",
        }
    }

    fn raw(self, job: &RawJob) -> Option<&str> {
        match self {
            TimestampField::StartTime => job.start_time.as_deref(),
            TimestampField::EndTime => job.end_time.as_deref(),
        }
    }
}

/// Parse `field` of `job`, returning `None` when it is absent, blank or
/// unparseable.
pub fn parse(job: &RawJob, field: TimestampField) -> Option<DateTime<Utc>> {
    let raw = field.raw(job)?;
    let date = raw.split_whitespace().next()?;
    match NaiveDate::parse_from_str(date, REMOTE_DATE_FORMAT) {
        Ok(date) => date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc()),
        Err(err) => {
            warn!(
                job_id = job.id.as_deref().unwrap_or("<none>"),
                field = field.name(),
                value = raw,
                "ignoring unparseable timestamp: {err}"
            );
            None
        }
    }
}

/// Like [`parse`], but falls back to `now` when no usable value exists.
pub fn normalize(job: &RawJob, field: TimestampField, now: DateTime<Utc>) -> DateTime<Utc> {
    parse(job, field).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job(start_time: Option<&str>, end_time: Option<&str>) -> RawJob {
        RawJob {
            id: Some("j1".to_string()),
            spider: Some("s1".to_string()),
            start_time: start_time.map(str::to_string),
            end_time: end_time.map(str::to_string),
        }
    }

    fn midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid date")
            .and_utc()
    }

    #[test]
    fn only_the_date_component_is_kept() {
        let raw = job(Some("2024-01-02 13:45:10.123456"), None);
        assert_eq!(
            parse(&raw, TimestampField::StartTime),
            Some(midnight(2024, 1, 2))
        );
    }

    #[test]
    fn absent_or_blank_values_fall_back_to_now() {
        let now = midnight(2030, 6, 1);
        for raw in [job(None, None), job(Some(""), None), job(Some("   "), None)] {
            assert_eq!(normalize(&raw, TimestampField::StartTime, now), now);
            assert_eq!(parse(&raw, TimestampField::StartTime), None);
        }
    }

    #[test]
    fn garbage_is_treated_as_absent() {
        let now = midnight(2030, 6, 1);
        let raw = job(Some("yesterday"), Some("02/01/2024 00:00"));
        assert_eq!(normalize(&raw, TimestampField::StartTime, now), now);
        assert_eq!(parse(&raw, TimestampField::EndTime), None);
    }

    #[test]
    fn fields_are_read_independently() {
        let raw = job(None, Some("2024-01-02 00:00:00.000000"));
        assert_eq!(parse(&raw, TimestampField::StartTime), None);
        assert_eq!(
            parse(&raw, TimestampField::EndTime),
            Some(midnight(2024, 1, 2))
        );
    }
}

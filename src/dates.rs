//! Conversions between local dates and the microsecond epoch timestamps the
//! API uses.

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone};

pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const USECS_PER_SEC: i64 = 1_000_000;
const USECS_PER_DAY: f64 = 86_400_000_000.0;

pub fn usecs_to_datetime(usecs: i64) -> DateTime<Local> {
    DateTime::from_timestamp_micros(usecs)
        .unwrap_or_default()
        .with_timezone(&Local)
}

pub fn usecs_to_date(usecs: i64, fmt: &str) -> String {
    usecs_to_datetime(usecs).format(fmt).to_string()
}

pub fn date_to_string(dt: &DateTime<Local>, fmt: &str) -> String {
    dt.format(fmt).to_string()
}

pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Whole-second microsecond timestamp of a local datetime.
pub fn datetime_to_usecs(dt: &DateTime<Local>) -> i64 {
    dt.timestamp() * USECS_PER_SEC
}

/// Parse `YYYY-MM-DD HH:MM:SS` (or `YYYY-MM-DD`, meaning midnight) as local
/// time.
pub fn date_to_usecs(date: &str) -> Option<i64> {
    let date = date.trim();
    let naive = NaiveDateTime::parse_from_str(date, DEFAULT_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    let local = match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => return None,
    };
    Some(datetime_to_usecs(&local))
}

/// Length of one `unit` in seconds. Months are 2 628 000 s and years
/// 31 536 000 s.
pub fn unit_seconds(unit: &str) -> Option<i64> {
    let secs = match unit.to_lowercase().as_str() {
        "seconds" | "second" | "sec" | "secs" => 1,
        "minutes" | "minute" | "min" | "mins" => 60,
        "hours" | "hour" => 3_600,
        "days" | "day" => 86_400,
        "weeks" | "week" => 604_800,
        "months" | "month" => 2_628_000,
        "years" | "year" => 31_536_000,
        _ => return None,
    };
    Some(secs)
}

/// Timestamp `amount` `unit`s before now. `None` for an unknown unit or an
/// age too large to represent.
pub fn time_ago(amount: i64, unit: &str) -> Option<i64> {
    let age = amount
        .checked_mul(unit_seconds(unit)?)?
        .checked_mul(USECS_PER_SEC)?;
    datetime_to_usecs(&now()).checked_sub(age)
}

/// Days between two timestamps, rounded.
pub fn day_diff(newer: i64, older: i64) -> i64 {
    ((newer - older) as f64 / USECS_PER_DAY).round() as i64
}

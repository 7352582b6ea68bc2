use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedDateTime {
    /// "Jan 1, 2024, 10:00 AM"
    pub date_time: String,
    /// "Mon, 01/01/2024"
    pub date_day: String,
    /// "Jan 1, 2024"
    pub date_only: String,
    /// "10:00 AM"
    pub time_only: String,
}

pub fn format_date_time(dt: &DateTime<Utc>, tz: Tz) -> FormattedDateTime {
    let local = dt.with_timezone(&tz);
    FormattedDateTime {
        date_time: local.format("%b %-d, %Y, %-I:%M %p").to_string(),
        date_day: local.format("%a, %m/%d/%Y").to_string(),
        date_only: local.format("%b %-d, %Y").to_string(),
        time_only: local.format("%-I:%M %p").to_string(),
    }
}

/// Parses an IANA timezone name such as "America/New_York".
pub fn parse_time_zone(name: &str) -> Result<Tz, AppError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AppError::BadRequest(format!("unknown time zone: {name}")))
}

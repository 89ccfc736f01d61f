use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use crate::config::*;

/// Turns a collection time such as `113/01/13 16:30:49` into a date-time on
/// the election day.
///
/// The value must hold exactly two whitespace-separated tokens. The first one
/// (the date, written in whatever calendar the source uses) is ignored, the
/// second one must be a `HH:MM:SS` clock time.
///
/// ```
/// use race_data::normalize_collected_at;
///
/// let dt = normalize_collected_at("113/01/13 16:30:49")?;
/// assert_eq!(dt.to_string(), "2024-01-13 16:30:49");
/// # Ok::<(), race_data::PrepareErrors>(())
/// ```
pub fn normalize_collected_at(raw: &str) -> Result<NaiveDateTime, PrepareErrors> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let time_token = match tokens.as_slice() {
        [_date, time] => *time,
        _ => {
            debug!("normalize_collected_at: wrong token count in {:?}", raw);
            return Err(PrepareErrors::FormatError(raw.to_string()));
        }
    };
    let time = NaiveTime::parse_from_str(time_token, "%H:%M:%S")
        .map_err(|_| PrepareErrors::FormatError(raw.to_string()))?;
    Ok(election_day().and_time(time))
}

/// Parses a reporting day of the case database.
///
/// Plain dates map to midnight. Full date-times are accepted with either a
/// space or a `T` separator.
pub fn parse_reported_on(raw: &str) -> Result<NaiveDateTime, PrepareErrors> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(PrepareErrors::FormatError(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 13)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn roc_calendar_date() {
        assert_eq!(
            normalize_collected_at("113/01/13 16:30:49"),
            Ok(at(16, 30, 49))
        );
    }

    #[test]
    fn date_token_is_ignored() {
        assert_eq!(normalize_collected_at("anything 00:00:00"), Ok(at(0, 0, 0)));
        assert_eq!(
            normalize_collected_at("  1999-12-31\t23:59:59 "),
            Ok(at(23, 59, 59))
        );
    }

    #[test]
    fn missing_separator() {
        assert_eq!(
            normalize_collected_at("113/01/13T16:30:49"),
            Err(PrepareErrors::FormatError("113/01/13T16:30:49".to_string()))
        );
        assert!(normalize_collected_at("").is_err());
    }

    #[test]
    fn too_many_tokens() {
        assert!(normalize_collected_at("113/01/13 16:30:49 PM").is_err());
    }

    #[test]
    fn bad_clock_time() {
        assert!(normalize_collected_at("113/01/13 16:30").is_err());
        assert!(normalize_collected_at("113/01/13 25:00:00").is_err());
        assert!(normalize_collected_at("113/01/13 noon").is_err());
    }

    #[test]
    fn reported_on_forms() {
        let midnight = NaiveDate::from_ymd_opt(2020, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_reported_on("2020-03-01"), Ok(midnight));
        assert_eq!(parse_reported_on("2020-03-01 00:00:00"), Ok(midnight));
        assert_eq!(parse_reported_on("2020-03-01T00:00:00"), Ok(midnight));
        assert!(parse_reported_on("03/01/2020").is_err());
    }
}

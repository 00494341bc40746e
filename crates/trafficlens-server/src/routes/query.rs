use chrono::{Datelike, NaiveDate};

use trafficlens_core::filter::{DateRange, ReportTimezone};

use crate::{error::AppError, state::AppState};

/// Default window is the last 7 days, today included.
pub(crate) const DEFAULT_LOOKBACK_DAYS: i64 = 6;

/// Longest report window accepted, in days.
pub(crate) const MAX_RANGE_DAYS: i64 = 3660;

/// Four-digit years only, matching `YYYY-MM-DD`.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

pub(crate) fn parse_defaulted_date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
    default_today: NaiveDate,
    default_lookback_days: i64,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = non_blank(start_date)
        .map(|raw| parse_strict_date(raw, "startDate"))
        .transpose()?
        .unwrap_or_else(|| default_today - chrono::Duration::days(default_lookback_days));
    let end = non_blank(end_date)
        .map(|raw| parse_strict_date(raw, "endDate"))
        .transpose()?
        .unwrap_or(default_today);
    validate_date_order(start, end)?;
    validate_date_span(start, end, MAX_RANGE_DAYS, "endDate")?;
    Ok((start, end))
}

/// Request timezone, then the caller's stored preference, then UTC.
///
/// An unparseable request value is a client error; an unparseable stored
/// preference is logged and ignored.
pub(crate) fn resolve_timezone(
    requested: Option<&str>,
    stored: Option<&str>,
) -> Result<ReportTimezone, AppError> {
    if let Some(raw) = non_blank(requested) {
        return Ok(ReportTimezone::parse(raw)?);
    }
    match non_blank(stored).map(|raw| (raw, ReportTimezone::parse(raw))) {
        Some((_, Ok(tz))) => Ok(tz),
        Some((raw, Err(_))) => {
            tracing::warn!(timezone = raw, "Ignoring invalid stored timezone preference");
            Ok(ReportTimezone::default())
        }
        None => Ok(ReportTimezone::default()),
    }
}

/// Resolve the report window for `caller`: timezone first, since the
/// default dates are "today" in that timezone.
pub(crate) async fn resolve_range(
    state: &AppState,
    caller: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
    timezone: Option<&str>,
) -> Result<DateRange, AppError> {
    let stored = if non_blank(timezone).is_none() {
        state.tenants.timezone_preference(caller).await?
    } else {
        None
    };
    let timezone = resolve_timezone(timezone, stored.as_deref())?;
    let (start, end) =
        parse_defaulted_date_range(start_date, end_date, timezone.today(), DEFAULT_LOOKBACK_DAYS)?;
    let range = DateRange {
        start,
        end,
        timezone,
    };
    range.utc_window()?;
    Ok(range)
}

pub(crate) fn parse_optional_bool(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<bool>, AppError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(AppError::bad_request(
            field,
            format!("{field} must be one of: true, false, 1, 0"),
        )),
    }
}

pub(crate) fn parse_optional_i64(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<i64>, AppError> {
    non_blank(value)
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| AppError::bad_request(field, format!("{field} must be an integer")))
        })
        .transpose()
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_strict_date(raw: &str, field: &'static str) -> Result<NaiveDate, AppError> {
    let invalid = || AppError::bad_request(field, format!("invalid {field} (expected YYYY-MM-DD)"));
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(invalid());
    }
    Ok(date)
}

fn validate_date_order(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::bad_request(
            "endDate",
            "endDate must be on or after startDate",
        ));
    }
    Ok(())
}

pub(crate) fn validate_date_span(
    start: NaiveDate,
    end: NaiveDate,
    max_days: i64,
    field: &'static str,
) -> Result<(), AppError> {
    let range_days = (end - start).num_days() + 1;
    if range_days > max_days {
        return Err(AppError::bad_request(
            field,
            format!("date range too large: {range_days} days (max {max_days})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use trafficlens_core::filter::ReportTimezone;

    use super::{
        parse_defaulted_date_range, parse_optional_bool, parse_optional_i64, resolve_timezone,
        validate_date_span, MAX_RANGE_DAYS,
    };
    use crate::error::AppError;

    fn rejected_field(result: Result<impl std::fmt::Debug, AppError>) -> &'static str {
        match result {
            Err(AppError::BadRequest { field, .. }) => field,
            other => panic!("expected a bad request, got {other:?}"),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date")
    }

    #[test]
    fn parse_optional_bool_accepts_common_variants() {
        assert_eq!(
            parse_optional_bool(Some("true"), "includeBots").expect("bool"),
            Some(true)
        );
        assert_eq!(
            parse_optional_bool(Some("0"), "includeBots").expect("bool"),
            Some(false)
        );
        assert_eq!(parse_optional_bool(None, "includeBots").expect("bool"), None);
        assert_eq!(
            rejected_field(parse_optional_bool(Some("yes"), "includeBots")),
            "includeBots"
        );
    }

    #[test]
    fn defaulted_range_covers_last_seven_days() {
        let (start, end) = parse_defaulted_date_range(None, Some(""), today(), 6).expect("range");
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 4).expect("valid date"));
        assert_eq!(end, today());
    }

    #[test]
    fn defaulted_range_rejects_reversed_bounds_and_bad_dates() {
        assert!(parse_defaulted_date_range(Some("2026-01-05"), Some("2026-01-01"), today(), 6).is_err());
        assert!(parse_defaulted_date_range(Some("bad-date"), None, today(), 6).is_err());
        assert_eq!(
            rejected_field(parse_defaulted_date_range(
                Some("2026-01-05"),
                Some("2026-01-01"),
                today(),
                6
            )),
            "endDate"
        );
    }

    #[test]
    fn defaulted_range_rejects_dates_beyond_four_digit_years() {
        assert_eq!(
            rejected_field(parse_defaulted_date_range(
                Some("+262142-12-31"),
                Some("+262142-12-31"),
                today(),
                6
            )),
            "startDate"
        );
        assert_eq!(
            rejected_field(parse_defaulted_date_range(Some("-262143-01-01"), None, today(), 6)),
            "startDate"
        );
        assert_eq!(
            rejected_field(parse_defaulted_date_range(None, Some("10000-01-01"), today(), 6)),
            "endDate"
        );
        assert!(parse_defaulted_date_range(Some("0001-01-01"), Some("0001-01-31"), today(), 6).is_ok());
    }

    #[test]
    fn validate_date_span_rejects_large_ranges() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        assert_eq!(rejected_field(validate_date_span(start, end, MAX_RANGE_DAYS, "endDate")), "endDate");
        assert!(parse_defaulted_date_range(Some("2000-01-01"), Some("2026-01-01"), today(), 6).is_err());

        let end = NaiveDate::from_ymd_opt(2000, 12, 31).expect("valid date");
        assert!(validate_date_span(start, end, MAX_RANGE_DAYS, "endDate").is_ok());
    }

    #[test]
    fn timezone_prefers_request_then_stored_then_utc() {
        assert_eq!(
            resolve_timezone(Some("+02:00"), Some("Europe/Warsaw"))
                .expect("tz")
                .name(),
            "+02:00"
        );
        assert_eq!(
            resolve_timezone(None, Some("Europe/Warsaw")).expect("tz").name(),
            "Europe/Warsaw"
        );
        assert_eq!(
            resolve_timezone(None, Some("Mars/Olympus")).expect("tz"),
            ReportTimezone::default()
        );
        assert_eq!(resolve_timezone(None, None).expect("tz"), ReportTimezone::default());
        assert_eq!(
            rejected_field(resolve_timezone(Some("Mars/Olympus"), None)),
            "timezone"
        );
    }

    #[test]
    fn parse_optional_i64_rejects_garbage() {
        assert_eq!(parse_optional_i64(Some(" 25 "), "limit").expect("int"), Some(25));
        assert_eq!(parse_optional_i64(None, "limit").expect("int"), None);
        assert_eq!(rejected_field(parse_optional_i64(Some("ten"), "limit")), "limit");
    }
}

//! Filter/query planner.
//!
//! Turns request filters, a match policy and a date range into a
//! [`QueryPlan`]: the store-agnostic description of which facts to group and
//! which auxiliary relations the fetcher has to join.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{
    Days, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::DEFAULT_ROW_LIMIT;
use crate::dimension::{AuxJoin, Dimension, FilterField};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Any,
    All,
}

impl MatchType {
    pub fn parse(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("any") => Ok(Self::Any),
            Some("all") => Ok(Self::All),
            Some(_) => Err(CoreError::InvalidMatchType),
        }
    }

    pub const fn connector(self) -> Connector {
        match self {
            MatchType::Any => Connector::Or,
            MatchType::All => Connector::And,
        }
    }
}

/// Multi-valued request filters plus the policy combining them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    fields: BTreeMap<FilterField, Vec<String>>,
    pub match_type: MatchType,
}

impl FilterSpec {
    pub fn new(match_type: MatchType) -> Self {
        Self {
            fields: BTreeMap::new(),
            match_type,
        }
    }

    /// Merge a comma-separated value list into `field`.
    ///
    /// Values are trimmed; empty values and repeats are dropped. First-seen
    /// order is kept.
    pub fn insert_raw(&mut self, field: FilterField, raw: &str) {
        for value in raw.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            let values = self.fields.entry(field).or_default();
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        }
    }

    pub fn values(&self, field: FilterField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fields holding at least one value, in catalog order.
    pub fn active(&self) -> impl Iterator<Item = (FilterField, &[String])> {
        self.fields
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| (*field, values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }
}

/// Timezone a report's calendar days are evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Default for ReportTimezone {
    fn default() -> Self {
        ReportTimezone::Named(chrono_tz::UTC)
    }
}

impl ReportTimezone {
    /// Accepts IANA names (`Europe/Warsaw`), `UTC`/`Z`, and fixed offsets in
    /// the forms `+05:30`, `-0800`, `+2`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::default());
        }
        if let Some(rest) = trimmed.strip_prefix('+') {
            return parse_offset(rest, 1, raw);
        }
        if let Some(rest) = trimmed.strip_prefix('-') {
            return parse_offset(rest, -1, raw);
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| CoreError::InvalidTimezone(raw.to_string()))
    }

    pub fn name(&self) -> String {
        match self {
            ReportTimezone::Named(tz) => tz.name().to_string(),
            ReportTimezone::Fixed(offset) => offset.to_string(),
        }
    }

    pub fn is_utc(&self) -> bool {
        match self {
            ReportTimezone::Named(tz) => *tz == chrono_tz::UTC,
            ReportTimezone::Fixed(offset) => offset.local_minus_utc() == 0,
        }
    }

    /// Seconds to add to a UTC timestamp to obtain local time at `utc`.
    pub fn offset_seconds_at(&self, utc: NaiveDateTime) -> i32 {
        match self {
            ReportTimezone::Named(tz) => tz.offset_from_utc_datetime(&utc).fix().local_minus_utc(),
            ReportTimezone::Fixed(offset) => offset.local_minus_utc(),
        }
    }

    /// The current calendar day in this timezone.
    pub fn today(&self) -> NaiveDate {
        let now = Utc::now().naive_utc();
        now.checked_add_signed(Duration::seconds(i64::from(self.offset_seconds_at(now))))
            .unwrap_or(now)
            .date()
    }

    /// UTC instant of local midnight starting `date`, or `None` when it falls
    /// outside the representable calendar.
    pub fn midnight_utc(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        let local = date.and_time(NaiveTime::MIN);
        let offset = match self {
            ReportTimezone::Named(tz) => match tz.offset_from_local_datetime(&local) {
                LocalResult::Single(o) | LocalResult::Ambiguous(o, _) => o.fix().local_minus_utc(),
                // Midnight skipped by a DST transition: shift by the offset in force.
                LocalResult::None => self.offset_seconds_at(local),
            },
            ReportTimezone::Fixed(offset) => offset.local_minus_utc(),
        };
        local.checked_sub_signed(Duration::seconds(i64::from(offset)))
    }
}

fn parse_offset(rest: &str, sign: i32, raw: &str) -> Result<ReportTimezone, CoreError> {
    let invalid = || CoreError::InvalidTimezone(raw.to_string());
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.as_str(), "0"),
        3 => digits.split_at(1),
        _ => digits.split_at(2),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .map(ReportTimezone::Fixed)
        .ok_or_else(invalid)
}

/// Inclusive calendar-day range in a report timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timezone: ReportTimezone,
}

impl DateRange {
    /// Half-open UTC window `[start 00:00, end + 1 day 00:00)` in local time.
    pub fn utc_window(&self) -> Result<(NaiveDateTime, NaiveDateTime), CoreError> {
        let start = self.timezone.midnight_utc(self.start);
        let end = self
            .end
            .checked_add_days(Days::new(1))
            .and_then(|next| self.timezone.midnight_utc(next));
        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(CoreError::DateOutOfRange),
        }
    }

    /// Offset used to project visit timestamps onto the local clock.
    ///
    /// Taken at the start of the window; a DST change inside the range is
    /// not followed.
    pub fn utc_offset_seconds(&self) -> Result<i32, CoreError> {
        let (start, _) = self.utc_window()?;
        Ok(self.timezone.offset_seconds_at(start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    Or,
    And,
}

/// `field ∈ {values}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldClause {
    pub field: FilterField,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub connector: Connector,
    pub clauses: Vec<FieldClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub dimensions: Vec<Dimension>,
    /// Always ANDed with the predicate.
    pub range: DateRange,
    pub predicate: Option<Predicate>,
    pub joins: BTreeSet<AuxJoin>,
    pub include_bots: bool,
    pub row_limit: usize,
}

impl QueryPlan {
    pub fn needs(&self, join: AuxJoin) -> bool {
        self.joins.contains(&join)
    }

    pub fn with_include_bots(mut self, include_bots: bool) -> Self {
        self.include_bots = include_bots;
        self
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }
}

pub fn plan(filters: &FilterSpec, dimensions: &[Dimension], range: &DateRange) -> QueryPlan {
    let clauses: Vec<FieldClause> = filters
        .active()
        .map(|(field, values)| FieldClause {
            field,
            values: values.to_vec(),
        })
        .collect();

    let joins: BTreeSet<AuxJoin> = dimensions
        .iter()
        .filter_map(|d| d.join())
        .chain(clauses.iter().filter_map(|c| c.field.join()))
        .collect();

    let predicate = (!clauses.is_empty()).then(|| Predicate {
        connector: filters.match_type.connector(),
        clauses,
    });

    QueryPlan {
        dimensions: dimensions.to_vec(),
        range: *range,
        predicate,
        joins,
        include_bots: false,
        row_limit: DEFAULT_ROW_LIMIT,
    }
}

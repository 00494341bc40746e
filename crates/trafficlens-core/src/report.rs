//! Fact rows, detail records and the collaborator traits the engine consumes.

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::dimension::Dimension;
use crate::error::CoreError;
use crate::filter::{DateRange, QueryPlan};

/// Directly additive counts of one fact group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RawMetrics {
    pub visitors: u64,
    pub engaged: u64,
    pub sales: u64,
    /// Revenue in minor currency units, serialised as a decimal `revenue`.
    #[serde(rename = "revenue", serialize_with = "serialize_cents")]
    pub revenue_cents: i64,
    /// Visits flagged by the fraud signal. Only meaningful at leaf level.
    #[serde(skip)]
    pub flagged: u64,
}

impl RawMetrics {
    pub fn revenue(&self) -> f64 {
        cents_to_units(self.revenue_cents)
    }

    /// Adds the additive counts. `flagged` is not rolled up.
    pub fn accumulate(&mut self, other: &RawMetrics) {
        self.visitors += other.visitors;
        self.engaged += other.engaged;
        self.sales += other.sales;
        self.revenue_cents += other.revenue_cents;
    }
}

pub(crate) fn cents_to_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub(crate) fn serialize_cents<S: Serializer>(cents: &i64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(cents_to_units(*cents))
}

/// One grouped row returned by a [`FactFetcher`]: one value per requested
/// dimension (aligned with `QueryPlan::dimensions`) plus its raw metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub values: Vec<Option<String>>,
    pub metrics: RawMetrics,
}

impl FactRow {
    pub fn value(&self, level: usize) -> Option<&str> {
        self.values.get(level).and_then(|v| v.as_deref())
    }
}

/// Executes query plans against a tenant's fact store.
#[async_trait]
pub trait FactFetcher: Send + Sync + 'static {
    /// Return one row per distinct combination of `plan.dimensions`, ordered
    /// by visitors descending. At most `plan.row_limit + 1` rows so callers
    /// can tell whether the result was capped.
    async fn fetch(&self, tenant_id: &str, plan: &QueryPlan) -> anyhow::Result<Vec<FactRow>>;
}

/// Maps a caller to the tenant whose data a request reads.
#[async_trait]
pub trait TenantResolver: Send + Sync + 'static {
    /// `explicit` when the caller is authorised for it, otherwise the
    /// caller's first authorised tenant when `explicit` is absent. `None`
    /// when the caller has no data access configured.
    async fn resolve(&self, caller: &str, explicit: Option<&str>) -> anyhow::Result<Option<String>>;

    /// The caller's stored timezone preference, if any.
    async fn timezone_preference(&self, caller: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    Visitors,
    Engaged,
    Sales,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Visitors, RecordKind::Engaged, RecordKind::Sales];

    pub const fn name(self) -> &'static str {
        match self {
            RecordKind::Visitors => "visitors",
            RecordKind::Engaged => "engaged",
            RecordKind::Sales => "sales",
        }
    }

    pub fn parse(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(value) => Self::ALL
                .into_iter()
                .find(|k| k.name().eq_ignore_ascii_case(value))
                .ok_or(CoreError::InvalidRecordKind),
        }
    }
}

/// Label the hierarchy uses for null dimension values. A slice value equal
/// to this label matches null in the record source.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// The individual visits behind one node of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub range: DateRange,
    /// Equality constraints, ANDed.
    pub slice: Vec<(Dimension, String)>,
    pub kind: RecordKind,
    pub include_bots: bool,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitRecord {
    pub id: String,
    pub visitor_id: String,
    pub created_at: String,
    pub channel: Option<String>,
    pub subchannel: Option<String>,
    pub keyword: Option<String>,
    pub landing_page: Option<String>,
    pub country: Option<String>,
    pub iporg: Option<String>,
    pub device_type: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub engaged: bool,
    pub sales: i64,
    #[serde(rename = "revenue", serialize_with = "serialize_cents")]
    pub revenue_cents: i64,
}

#[derive(Debug, Clone)]
pub struct RecordPage {
    pub rows: Vec<VisitRecord>,
    pub total: i64,
}

/// Lists the individual records behind a drill-down link.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    async fn list_records(&self, tenant_id: &str, query: &RecordQuery) -> anyhow::Result<RecordPage>;
}

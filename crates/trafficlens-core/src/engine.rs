//! Report orchestration: plan → fetch → cap → build → annotate.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::dimension::Dimension;
use crate::filter::{plan, DateRange, FilterSpec};
use crate::hierarchy::{build, verify_additive, AggregateNode};
use crate::links::{annotate, LinkContext};
use crate::report::{FactFetcher, FactRow};

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub dimensions: Vec<Dimension>,
    pub filters: FilterSpec,
    pub range: DateRange,
    pub include_bots: bool,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub row_limit: usize,
    pub records_path: String,
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            row_limit: config.row_limit,
            records_path: config.records_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    pub data: Vec<AggregateNode>,
    pub group_by_fields: Vec<Dimension>,
    pub is_hierarchical: bool,
    /// Set when the fact query hit `row_limit` and rows were dropped.
    pub truncated: bool,
    pub row_limit: usize,
    #[serde(skip)]
    pub leaf_collisions: usize,
}

/// Drop rows beyond `limit`. Returns whether anything was dropped.
pub fn cap_rows(rows: &mut Vec<FactRow>, limit: usize) -> bool {
    if rows.len() > limit {
        rows.truncate(limit);
        true
    } else {
        false
    }
}

/// Fetch failures propagate unchanged; retrying belongs to the fetcher.
pub async fn run_report(
    fetcher: &dyn FactFetcher,
    tenant_id: &str,
    request: &ReportRequest,
    options: &EngineOptions,
) -> anyhow::Result<ReportOutput> {
    let plan = plan(&request.filters, &request.dimensions, &request.range)
        .with_include_bots(request.include_bots)
        .with_row_limit(options.row_limit);

    let mut rows = fetcher.fetch(tenant_id, &plan).await?;
    let truncated = cap_rows(&mut rows, options.row_limit);
    if truncated {
        warn!(
            tenant_id,
            row_limit = options.row_limit,
            "Fact rows exceeded the row limit, report truncated"
        );
    }

    let hierarchy = build(&rows, &plan.dimensions);
    debug_assert!(verify_additive(&hierarchy.nodes).is_ok());
    let mut data = hierarchy.nodes;
    annotate(
        &mut data,
        &plan.dimensions,
        &LinkContext {
            records_path: options.records_path.clone(),
            tenant_id: tenant_id.to_string(),
            range: request.range,
            include_bots: request.include_bots,
        },
    );

    info!(
        tenant_id,
        rows = rows.len(),
        top_level = data.len(),
        depth = plan.dimensions.len(),
        "Report built"
    );

    Ok(ReportOutput {
        data,
        is_hierarchical: plan.dimensions.len() > 1,
        group_by_fields: plan.dimensions,
        truncated,
        row_limit: options.row_limit,
        leaf_collisions: hierarchy.leaf_collisions,
    })
}

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use trafficlens_core::dimension::{resolve_dimensions, FilterField};
use trafficlens_core::engine::{run_report, EngineOptions, ReportOutput, ReportRequest};
use trafficlens_core::filter::{FilterSpec, MatchType};

use crate::{
    auth::CallerIdentity,
    error::AppError,
    routes::query::{parse_optional_bool, resolve_range},
    state::AppState,
};

pub(crate) const NO_TENANT_MESSAGE: &str = "No data access is configured for this account.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub group_by: Option<String>,
    pub match_type: Option<String>,
    pub dkey: Option<String>,
    pub include_bots: Option<String>,
    pub timezone: Option<String>,
    pub channel: Option<String>,
    pub subchannel: Option<String>,
    pub country: Option<String>,
    pub keyword: Option<String>,
    pub iporg: Option<String>,
    #[serde(rename = "page_action")]
    pub page_action: Option<String>,
}

impl ReportQuery {
    fn filter_value(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Channel => self.channel.as_deref(),
            FilterField::Subchannel => self.subchannel.as_deref(),
            FilterField::Country => self.country.as_deref(),
            FilterField::Keyword => self.keyword.as_deref(),
            FilterField::Iporg => self.iporg.as_deref(),
            FilterField::PageAction => self.page_action.as_deref(),
        }
    }

    fn filters(&self) -> Result<FilterSpec, AppError> {
        let mut filters = FilterSpec::new(MatchType::parse(self.match_type.as_deref())?);
        for field in FilterField::ALL {
            if let Some(raw) = self.filter_value(field) {
                filters.insert_raw(field, raw);
            }
        }
        Ok(filters)
    }
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    success: bool,
    #[serde(flatten)]
    report: ReportOutput,
}

/// `GET /api/report` - Hierarchical breakdown over up to `max_group_by`
/// dimensions, with drill-down links on every node.
#[tracing::instrument(skip(state, caller, query), fields(caller = %caller.0))]
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let filters = query.filters()?;
    let include_bots =
        parse_optional_bool(query.include_bots.as_deref(), "includeBots")?.unwrap_or(false);
    let range = resolve_range(
        &state,
        &caller.0,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        query.timezone.as_deref(),
    )
    .await?;
    let dimensions = resolve_dimensions(query.group_by.as_deref(), state.config.max_group_by);

    let Some(tenant_id) = state
        .tenants
        .resolve(&caller.0, query.dkey.as_deref())
        .await?
    else {
        tracing::info!("No tenant resolved for caller");
        return Ok(Json(json!({
            "success": true,
            "data": [],
            "message": NO_TENANT_MESSAGE
        }))
        .into_response());
    };

    let request = ReportRequest {
        dimensions,
        filters,
        range,
        include_bots,
    };
    let options = EngineOptions::from(state.config.as_ref());
    let report = run_report(state.facts.as_ref(), &tenant_id, &request, &options).await?;

    Ok(Json(ReportResponse {
        success: true,
        report,
    })
    .into_response())
}

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use trafficlens_core::dimension::Dimension;
use trafficlens_core::report::{RecordKind, RecordQuery};

use crate::{
    auth::CallerIdentity,
    error::AppError,
    routes::query::{parse_optional_bool, parse_optional_i64, resolve_range},
    routes::report::NO_TENANT_MESSAGE,
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Parameters as emitted by the drill-down links, plus paging.
///
/// Dimension constraints arrive under their catalog names and are collected
/// into `dimensions`; unrecognised keys are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub dkey: Option<String>,
    pub timezone: Option<String>,
    pub include_bots: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    #[serde(flatten)]
    pub dimensions: HashMap<String, String>,
}

impl RecordsQuery {
    /// Catalog-ordered slice. Without any dimension parameter, `label` alone
    /// constrains the default dimension. Values are matched verbatim.
    fn slice(&self) -> Vec<(Dimension, String)> {
        let mut slice: Vec<(Dimension, String)> = Dimension::ALL
            .into_iter()
            .filter_map(|d| {
                present(self.dimensions.get(d.name()).map(String::as_str))
                    .map(|v| (d, v.to_string()))
            })
            .collect();
        if slice.is_empty() {
            if let Some(label) = present(self.label.as_deref()) {
                slice.push((Dimension::DEFAULT, label.to_string()));
            }
        }
        slice
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// `GET /api/records` - The visits behind one report node.
#[tracing::instrument(skip(state, caller, query), fields(caller = %caller.0))]
pub async fn get_records(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kind = RecordKind::parse(query.kind.as_deref())?;
    let include_bots =
        parse_optional_bool(query.include_bots.as_deref(), "includeBots")?.unwrap_or(false);
    let limit = parse_optional_i64(query.limit.as_deref(), "limit")?
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);
    let offset = parse_optional_i64(query.offset.as_deref(), "offset")?
        .unwrap_or(0)
        .max(0);
    let range = resolve_range(
        &state,
        &caller.0,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        query.timezone.as_deref(),
    )
    .await?;

    let Some(tenant_id) = state
        .tenants
        .resolve(&caller.0, query.dkey.as_deref())
        .await?
    else {
        return Ok(Json(json!({
            "success": true,
            "data": [],
            "pagination": { "total": 0, "limit": limit, "offset": offset, "has_more": false },
            "message": NO_TENANT_MESSAGE
        })));
    };

    let record_query = RecordQuery {
        range,
        slice: query.slice(),
        kind,
        include_bots,
        limit,
        offset,
    };
    let page = state.records.list_records(&tenant_id, &record_query).await?;
    let has_more = offset + (page.rows.len() as i64) < page.total;

    Ok(Json(json!({
        "success": true,
        "data": page.rows,
        "pagination": {
            "total": page.total,
            "limit": limit,
            "offset": offset,
            "has_more": has_more
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)], label: Option<&str>) -> RecordsQuery {
        RecordsQuery {
            start_date: None,
            end_date: None,
            dkey: None,
            timezone: None,
            include_bots: None,
            label: label.map(str::to_string),
            kind: None,
            limit: None,
            offset: None,
            dimensions: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn slice_follows_catalog_order_and_skips_blanks() {
        let q = query(
            &[("country", "US"), ("channel", "email"), ("keyword", " "), ("utm", "x")],
            Some("email"),
        );
        assert_eq!(
            q.slice(),
            vec![
                (Dimension::Channel, "email".to_string()),
                (Dimension::Country, "US".to_string())
            ]
        );
    }

    #[test]
    fn label_alone_targets_default_dimension() {
        assert_eq!(
            query(&[], Some("ppc")).slice(),
            vec![(Dimension::DEFAULT, "ppc".to_string())]
        );
        assert!(query(&[], None).slice().is_empty());
        assert!(query(&[], Some("  ")).slice().is_empty());
    }

    #[test]
    fn slice_keeps_padded_values_verbatim() {
        assert_eq!(
            query(&[("channel", " email")], None).slice(),
            vec![(Dimension::Channel, " email".to_string())]
        );
        assert_eq!(
            query(&[], Some("ppc ")).slice(),
            vec![(Dimension::DEFAULT, "ppc ".to_string())]
        );
    }
}

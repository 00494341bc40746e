use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use trafficlens_core::dimension::{Dimension, FilterField};

use crate::state::AppState;

/// `GET /api/dimensions` - The grouping catalog and filterable fields, so
/// clients can build `groupBy` without hard-coding names.
pub async fn list_dimensions(State(state): State<Arc<AppState>>) -> Json<Value> {
    let dimensions: Vec<Value> = Dimension::ALL
        .into_iter()
        .map(|d| json!({ "name": d, "join": d.join() }))
        .collect();
    let filters: Vec<&str> = FilterField::ALL.into_iter().map(FilterField::name).collect();
    Json(json!({
        "dimensions": dimensions,
        "filterFields": filters,
        "default": Dimension::DEFAULT,
        "maxGroupBy": state.config.max_group_by
    }))
}

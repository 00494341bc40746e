use anyhow::Result;

use trafficlens_core::filter::QueryPlan;
use trafficlens_core::report::{FactRow, RawMetrics};

use crate::queries::bot_filters::append_visit_bot_filter;
use crate::queries::sql::{actions_cte, dimension_sql, join_sql, predicate_sql, Params};
use crate::DuckDbBackend;

/// Run a grouped fact query for `plan` and return one row per distinct
/// dimension tuple, visitors descending.
///
/// Fetches up to `plan.row_limit + 1` rows so the engine can tell a capped
/// result from an exact one.
pub async fn fetch_facts_inner(
    db: &DuckDbBackend,
    tenant_id: &str,
    plan: &QueryPlan,
) -> Result<Vec<FactRow>> {
    let offset_seconds = plan.range.utc_offset_seconds()?;
    let (window_start, window_end) = plan.range.utc_window()?;

    let mut params = Params::default();
    let tenant = params.push(tenant_id.to_string());
    let start = params.push_timestamp(window_start);
    let end = params.push_timestamp(window_end);

    let select_dims: Vec<String> = plan
        .dimensions
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{} AS d{i}", dimension_sql(*d, offset_seconds)))
        .collect();
    let group_by: Vec<String> = (0..plan.dimensions.len()).map(|i| format!("d{i}")).collect();
    let order_by: Vec<String> = group_by.iter().map(|c| format!("{c} NULLS LAST")).collect();

    let mut joins = String::new();
    for join in &plan.joins {
        joins.push_str(join_sql(*join));
    }

    let mut filter_sql = String::new();
    append_visit_bot_filter(&mut filter_sql, plan.include_bots, "v.");
    filter_sql.push_str(&predicate_sql(
        plan.predicate.as_ref(),
        &mut params,
        offset_seconds,
    ));

    let limit = params.push(i64::try_from(plan.row_limit.saturating_add(1)).unwrap_or(i64::MAX));

    // Sales and revenue are pre-aggregated per visit so a visit with several
    // actions still counts once towards visitors/engaged.
    let sql = format!(
        "WITH {cte} \
         SELECT {dims}, \
                CAST(COUNT(*) AS BIGINT) AS visitors, \
                CAST(SUM(CASE WHEN v.engaged THEN 1 ELSE 0 END) AS BIGINT) AS engaged, \
                CAST(COALESCE(SUM(a.sales), 0) AS BIGINT) AS sales, \
                CAST(ROUND(COALESCE(SUM(a.revenue), 0) * 100) AS BIGINT) AS revenue_cents, \
                CAST(SUM(CASE WHEN v.is_flagged THEN 1 ELSE 0 END) AS BIGINT) AS flagged \
         FROM visits v \
         LEFT JOIN act a ON a.visit_id = v.id{joins} \
         WHERE v.tenant_id = {tenant} \
           AND v.created_at >= {start} AND v.created_at < {end}{filter_sql} \
         GROUP BY {group_by} \
         ORDER BY visitors DESC, {order_by} \
         LIMIT {limit}",
        cte = actions_cte(&tenant),
        dims = select_dims.join(", "),
        group_by = group_by.join(", "),
        order_by = order_by.join(", "),
    );

    let dimension_count = plan.dimensions.len();
    let conn = db.conn.lock().await;
    let refs = params.refs();
    let mut stmt = conn.prepare(&sql)?;
    let rows_iter = stmt.query_map(refs.as_slice(), |row| {
        let mut values = Vec::with_capacity(dimension_count);
        for i in 0..dimension_count {
            values.push(row.get::<_, Option<String>>(i)?);
        }
        let count = |idx: usize| -> duckdb::Result<u64> {
            let raw: i64 = row.get(idx)?;
            Ok(u64::try_from(raw).unwrap_or(0))
        };
        Ok(FactRow {
            values,
            metrics: RawMetrics {
                visitors: count(dimension_count)?,
                engaged: count(dimension_count + 1)?,
                sales: count(dimension_count + 2)?,
                revenue_cents: row.get(dimension_count + 3)?,
                flagged: count(dimension_count + 4)?,
            },
        })
    })?;

    let mut rows = Vec::new();
    for row in rows_iter {
        rows.push(row?);
    }
    tracing::debug!(tenant_id, rows = rows.len(), "Fact query returned");
    Ok(rows)
}

use anyhow::Result;

use trafficlens_core::report::{RecordKind, RecordPage, RecordQuery, VisitRecord, UNKNOWN_LABEL};

use crate::queries::bot_filters::append_visit_bot_filter;
use crate::queries::sql::{actions_cte, dimension_sql, Params};
use crate::DuckDbBackend;

/// List the visits behind one report node, newest first.
///
/// Slice values equal to `Unknown` match visits where the dimension is null,
/// mirroring how the hierarchy labels missing values.
pub async fn list_records_inner(
    db: &DuckDbBackend,
    tenant_id: &str,
    query: &RecordQuery,
) -> Result<RecordPage> {
    let offset_seconds = query.range.utc_offset_seconds()?;
    let (window_start, window_end) = query.range.utc_window()?;

    let mut params = Params::default();
    let tenant = params.push(tenant_id.to_string());
    let start = params.push_timestamp(window_start);
    let end = params.push_timestamp(window_end);

    let mut filter_sql = String::new();
    append_visit_bot_filter(&mut filter_sql, query.include_bots, "v.");
    for (dimension, value) in &query.slice {
        let column = dimension_sql(*dimension, offset_seconds);
        if value == UNKNOWN_LABEL {
            filter_sql.push_str(&format!(" AND {column} IS NULL"));
        } else {
            let placeholder = params.push(value.clone());
            filter_sql.push_str(&format!(" AND {column} = {placeholder}"));
        }
    }
    match query.kind {
        RecordKind::Visitors => {}
        RecordKind::Engaged => filter_sql.push_str(" AND v.engaged"),
        RecordKind::Sales => filter_sql.push_str(" AND COALESCE(a.sales, 0) > 0"),
    }

    let from_sql = format!(
        "FROM visits v \
         LEFT JOIN act a ON a.visit_id = v.id \
         LEFT JOIN ip_lookup g ON g.ip = v.ip \
         LEFT JOIN user_agents d ON d.id = v.user_agent_id \
         WHERE v.tenant_id = {tenant} \
           AND v.created_at >= {start} AND v.created_at < {end}{filter_sql}"
    );
    let cte = actions_cte(&tenant);

    let conn = db.conn.lock().await;

    let count_sql = format!("WITH {cte} SELECT CAST(COUNT(*) AS BIGINT) {from_sql}");
    let total: i64 = {
        let refs = params.refs();
        let mut stmt = conn.prepare(&count_sql)?;
        stmt.query_row(refs.as_slice(), |row| row.get(0))?
    };

    let limit = params.push(query.limit);
    let offset = params.push(query.offset);
    let data_sql = format!(
        "WITH {cte} \
         SELECT v.id, v.visitor_id, strftime(v.created_at, '%Y-%m-%dT%H:%M:%SZ'), \
                v.channel, v.subchannel, v.keyword, v.landing_page, \
                g.country, g.iporg, d.device_type, d.os, d.browser, \
                v.engaged, \
                CAST(COALESCE(a.sales, 0) AS BIGINT), \
                CAST(ROUND(COALESCE(a.revenue, 0) * 100) AS BIGINT) \
         {from_sql} \
         ORDER BY v.created_at DESC, v.id \
         LIMIT {limit} OFFSET {offset}"
    );

    let refs = params.refs();
    let mut stmt = conn.prepare(&data_sql)?;
    let rows_iter = stmt.query_map(refs.as_slice(), |row| {
        Ok(VisitRecord {
            id: row.get(0)?,
            visitor_id: row.get(1)?,
            created_at: row.get(2)?,
            channel: row.get(3)?,
            subchannel: row.get(4)?,
            keyword: row.get(5)?,
            landing_page: row.get(6)?,
            country: row.get(7)?,
            iporg: row.get(8)?,
            device_type: row.get(9)?,
            os: row.get(10)?,
            browser: row.get(11)?,
            engaged: row.get(12)?,
            sales: row.get(13)?,
            revenue_cents: row.get(14)?,
        })
    })?;

    let mut rows = Vec::new();
    for row in rows_iter {
        rows.push(row?);
    }
    Ok(RecordPage { rows, total })
}

impl DuckDbBackend {
    pub async fn list_records(&self, tenant_id: &str, query: &RecordQuery) -> Result<RecordPage> {
        list_records_inner(self, tenant_id, query).await
    }
}

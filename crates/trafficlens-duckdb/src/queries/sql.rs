//! Renders catalog accessors, joins and filter clauses into DuckDB SQL.
//!
//! Column names only ever come from the closed dimension catalog, so they
//! are formatted into SQL directly; every request-supplied value is bound as
//! a positional parameter.

use chrono::NaiveDateTime;

use trafficlens_core::dimension::{Accessor, AuxJoin, ClockPart, Dimension};
use trafficlens_core::filter::{Connector, FieldClause, Predicate};

use crate::backend::TIMESTAMP_FORMAT;

/// Positional parameter list; `push` returns the placeholder to splice in.
#[derive(Default)]
pub(crate) struct Params {
    values: Vec<Box<dyn duckdb::types::ToSql + Send>>,
}

impl Params {
    pub(crate) fn push<T: duckdb::types::ToSql + Send + 'static>(&mut self, value: T) -> String {
        self.values.push(Box::new(value));
        format!("?{}", self.values.len())
    }

    pub(crate) fn push_timestamp(&mut self, ts: NaiveDateTime) -> String {
        let placeholder = self.push(ts.format(TIMESTAMP_FORMAT).to_string());
        format!("CAST({placeholder} AS TIMESTAMP)")
    }

    pub(crate) fn refs(&self) -> Vec<&dyn duckdb::types::ToSql> {
        self.values.iter().map(|p| p.as_ref() as &dyn duckdb::types::ToSql).collect()
    }
}

/// Visit timestamp projected onto the report's local clock.
fn local_ts(offset_seconds: i32) -> String {
    if offset_seconds == 0 {
        "v.created_at".to_string()
    } else {
        format!("(v.created_at + to_seconds({offset_seconds}))")
    }
}

pub(crate) fn accessor_sql(accessor: Accessor, offset_seconds: i32) -> String {
    match accessor {
        Accessor::Visit(column) => format!("v.{column}"),
        Accessor::Geo(column) => format!("g.{column}"),
        Accessor::Device(column) => format!("d.{column}"),
        Accessor::Clock(part) => {
            let local = local_ts(offset_seconds);
            match part {
                ClockPart::Date => format!("strftime({local}, '%Y-%m-%d')"),
                ClockPart::Hour => format!("strftime({local}, '%H')"),
                ClockPart::DayOfWeek => format!("dayname({local})"),
            }
        }
    }
}

pub(crate) fn dimension_sql(dimension: Dimension, offset_seconds: i32) -> String {
    accessor_sql(dimension.accessor(), offset_seconds)
}

pub(crate) fn join_sql(join: AuxJoin) -> &'static str {
    match join {
        AuxJoin::Geo => " LEFT JOIN ip_lookup g ON g.ip = v.ip",
        AuxJoin::Device => " LEFT JOIN user_agents d ON d.id = v.user_agent_id",
    }
}

/// Per-visit sale counts and revenue, scoped to one tenant.
pub(crate) fn actions_cte(tenant_placeholder: &str) -> String {
    format!(
        "act AS ( \
           SELECT visit_id, \
                  COUNT(*) FILTER (WHERE action_type = 'sale') AS sales, \
                  COALESCE(SUM(revenue) FILTER (WHERE action_type = 'sale'), 0) AS revenue \
           FROM actions \
           WHERE tenant_id = {tenant_placeholder} \
           GROUP BY visit_id \
         )"
    )
}

fn clause_sql(clause: &FieldClause, params: &mut Params, offset_seconds: i32) -> String {
    let placeholders: Vec<String> = clause
        .values
        .iter()
        .map(|value| params.push(value.clone()))
        .collect();
    let list = placeholders.join(", ");
    match clause.field.dimension() {
        Some(dimension) => format!("{} IN ({list})", dimension_sql(dimension, offset_seconds)),
        None => format!(
            "EXISTS (SELECT 1 FROM actions fa \
             WHERE fa.tenant_id = v.tenant_id AND fa.visit_id = v.id \
             AND fa.action_type IN ({list}))"
        ),
    }
}

/// ` AND (clause OR clause ...)`, or empty when there is no predicate.
pub(crate) fn predicate_sql(
    predicate: Option<&Predicate>,
    params: &mut Params,
    offset_seconds: i32,
) -> String {
    let Some(predicate) = predicate else {
        return String::new();
    };
    let clauses: Vec<String> = predicate
        .clauses
        .iter()
        .map(|clause| clause_sql(clause, params, offset_seconds))
        .collect();
    if clauses.is_empty() {
        return String::new();
    }
    let connector = match predicate.connector {
        Connector::Or => " OR ",
        Connector::And => " AND ",
    };
    format!(" AND ({})", clauses.join(connector))
}

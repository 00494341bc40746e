/// Append a bot filter predicate for visit aliases when `include_bots=false`.
pub fn append_visit_bot_filter(filter_sql: &mut String, include_bots: bool, column_prefix: &str) {
    if !include_bots {
        filter_sql.push_str(&format!(" AND {column_prefix}is_bot = FALSE"));
    }
}

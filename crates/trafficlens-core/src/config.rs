/// Default cap on fact rows accepted per report before the hierarchy build.
pub const DEFAULT_ROW_LIMIT: usize = 1000;

/// Default maximum number of `groupBy` dimensions honoured per report.
pub const DEFAULT_MAX_GROUP_BY: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB `memory_limit` size string, e.g. `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    pub cors_origins: Vec<String>,
    /// Hard cap on fact rows folded into one report. Rows beyond the cap are
    /// dropped and the response carries `truncated: true`.
    pub row_limit: usize,
    pub max_group_by: usize,
    /// Path the drill-down links point at.
    pub records_path: String,
    /// Header carrying the caller id, set by the authenticating gateway.
    pub identity_header: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("TRAFFICLENS_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("TRAFFICLENS_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("TRAFFICLENS_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("TRAFFICLENS_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            row_limit: std::env::var("TRAFFICLENS_ROW_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_ROW_LIMIT),
            max_group_by: std::env::var("TRAFFICLENS_MAX_GROUP_BY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_MAX_GROUP_BY),
            records_path: std::env::var("TRAFFICLENS_RECORDS_PATH")
                .unwrap_or_else(|_| "/api/records".to_string()),
            identity_header: std::env::var("TRAFFICLENS_IDENTITY_HEADER")
                .map(|v| v.trim().to_ascii_lowercase())
                .unwrap_or_else(|_| "x-user-id".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            cors_origins: Vec::new(),
            row_limit: DEFAULT_ROW_LIMIT,
            max_group_by: DEFAULT_MAX_GROUP_BY,
            records_path: "/api/records".to_string(),
            identity_header: "x-user-id".to_string(),
        }
    }
}

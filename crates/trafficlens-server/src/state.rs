use std::sync::Arc;

use trafficlens_core::config::Config;
use trafficlens_core::report::{FactFetcher, RecordSource, TenantResolver};
use trafficlens_duckdb::DuckDbBackend;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// The report path only talks to the collaborator traits; `db` is kept for
/// the health probe.
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to clone and async-safe.
    pub db: Arc<DuckDbBackend>,

    pub facts: Arc<dyn FactFetcher>,
    pub tenants: Arc<dyn TenantResolver>,
    pub records: Arc<dyn RecordSource>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire every collaborator to the given DuckDB backend.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            facts: Arc::clone(&db) as Arc<dyn FactFetcher>,
            tenants: Arc::clone(&db) as Arc<dyn TenantResolver>,
            records: Arc::clone(&db) as Arc<dyn RecordSource>,
            db,
            config: Arc::new(config),
        }
    }

    /// Swap the fact fetcher, e.g. to inject failures in tests.
    pub fn with_fact_fetcher(mut self, facts: Arc<dyn FactFetcher>) -> Self {
        self.facts = facts;
        self
    }
}

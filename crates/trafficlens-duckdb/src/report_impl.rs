use async_trait::async_trait;

use trafficlens_core::filter::QueryPlan;
use trafficlens_core::report::{
    FactFetcher, FactRow, RecordPage, RecordQuery, RecordSource, TenantResolver,
};

use crate::DuckDbBackend;

#[async_trait]
impl FactFetcher for DuckDbBackend {
    async fn fetch(&self, tenant_id: &str, plan: &QueryPlan) -> anyhow::Result<Vec<FactRow>> {
        crate::queries::facts::fetch_facts_inner(self, tenant_id, plan).await
    }
}

#[async_trait]
impl TenantResolver for DuckDbBackend {
    async fn resolve(&self, caller: &str, explicit: Option<&str>) -> anyhow::Result<Option<String>> {
        DuckDbBackend::resolve_tenant(self, caller, explicit).await
    }

    async fn timezone_preference(&self, caller: &str) -> anyhow::Result<Option<String>> {
        DuckDbBackend::timezone_preference(self, caller).await
    }
}

#[async_trait]
impl RecordSource for DuckDbBackend {
    async fn list_records(&self, tenant_id: &str, query: &RecordQuery) -> anyhow::Result<RecordPage> {
        crate::queries::records::list_records_inner(self, tenant_id, query).await
    }
}

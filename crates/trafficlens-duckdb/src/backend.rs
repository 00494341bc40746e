use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::schema::init_sql;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A DuckDB-backed fact store for trafficlens.
///
/// Reports only read, so the connection is shared behind a `tokio` mutex;
/// each query holds the lock for the duration of one statement batch.
/// Memory and thread limits are enforced by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

/// A page-visit fact to insert. Used by fixtures and the loader.
#[derive(Debug, Clone, Default)]
pub struct NewVisit {
    pub visitor_id: String,
    /// UTC.
    pub created_at: NaiveDateTime,
    pub channel: Option<String>,
    pub subchannel: Option<String>,
    pub keyword: Option<String>,
    pub landing_page: Option<String>,
    pub ip: Option<String>,
    pub user_agent_id: Option<String>,
    pub engaged: bool,
    pub is_bot: bool,
    pub is_flagged: bool,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database. Intended for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    pub async fn seed_tenant(&self, id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO tenants (id, name) VALUES (?1, ?2)
               ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"#,
            duckdb::params![id, name],
        )?;
        Ok(())
    }

    pub async fn upsert_ip(&self, ip: &str, country: Option<&str>, iporg: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO ip_lookup (ip, country, iporg) VALUES (?1, ?2, ?3)
               ON CONFLICT (ip) DO UPDATE SET country = EXCLUDED.country, iporg = EXCLUDED.iporg"#,
            duckdb::params![ip, country, iporg],
        )?;
        Ok(())
    }

    pub async fn upsert_user_agent(
        &self,
        id: &str,
        device_type: Option<&str>,
        os: Option<&str>,
        browser: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO user_agents (id, device_type, os, browser) VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT (id) DO UPDATE SET device_type = EXCLUDED.device_type,
                   os = EXCLUDED.os, browser = EXCLUDED.browser"#,
            duckdb::params![id, device_type, os, browser],
        )?;
        Ok(())
    }

    /// Insert one visit fact and return its generated id.
    pub async fn insert_visit(&self, tenant_id: &str, visit: &NewVisit) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO visits (
                id, tenant_id, visitor_id, created_at,
                channel, subchannel, keyword, landing_page,
                ip, user_agent_id, engaged, is_bot, is_flagged
            ) VALUES (
                ?1, ?2, ?3, CAST(?4 AS TIMESTAMP),
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13
            )"#,
            duckdb::params![
                id,
                tenant_id,
                visit.visitor_id,
                visit.created_at.format(TIMESTAMP_FORMAT).to_string(),
                visit.channel,
                visit.subchannel,
                visit.keyword,
                visit.landing_page,
                visit.ip,
                visit.user_agent_id,
                visit.engaged,
                visit.is_bot,
                visit.is_flagged,
            ],
        )?;
        Ok(id)
    }

    /// Record an action against a visit. Only `sale` actions count towards
    /// sales and revenue.
    pub async fn insert_action(
        &self,
        tenant_id: &str,
        visit_id: &str,
        action_type: &str,
        revenue: f64,
        created_at: NaiveDateTime,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO actions (id, tenant_id, visit_id, action_type, revenue, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, CAST(?6 AS TIMESTAMP))"#,
            duckdb::params![
                id,
                tenant_id,
                visit_id,
                action_type,
                revenue,
                created_at.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(id)
    }
}

use anyhow::Result;
use tracing::warn;

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Tenants `user_id` may read, by priority then id.
    pub async fn authorized_tenants(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT tenant_id FROM tenant_members \
             WHERE user_id = ?1 \
             ORDER BY priority, tenant_id",
        )?;
        let rows = stmt.query_map(duckdb::params![user_id], |row| row.get::<_, String>(0))?;
        let mut tenants = Vec::new();
        for row in rows {
            tenants.push(row?);
        }
        Ok(tenants)
    }

    /// Pick the tenant a request reads.
    ///
    /// An explicit key is honoured only when the caller is a member of it;
    /// otherwise the result is `None` rather than a fallback, so a request
    /// never silently reads a tenant other than the one it named.
    pub async fn resolve_tenant(&self, user_id: &str, explicit: Option<&str>) -> Result<Option<String>> {
        let tenants = self.authorized_tenants(user_id).await?;
        match explicit.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => {
                if tenants.iter().any(|t| t == key) {
                    Ok(Some(key.to_string()))
                } else {
                    warn!(user_id, dkey = key, "Caller is not authorised for requested tenant");
                    Ok(None)
                }
            }
            None => Ok(tenants.into_iter().next()),
        }
    }

    pub async fn grant_tenant_access(&self, user_id: &str, tenant_id: &str, priority: i32) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO tenant_members (user_id, tenant_id, priority) VALUES (?1, ?2, ?3) \
             ON CONFLICT (user_id, tenant_id) DO UPDATE SET priority = EXCLUDED.priority",
            duckdb::params![user_id, tenant_id, priority],
        )?;
        Ok(())
    }

    pub async fn timezone_preference(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT timezone FROM user_preferences WHERE user_id = ?1",
            duckdb::params![user_id],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(tz) => Ok(tz.filter(|t| !t.trim().is_empty())),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_timezone_preference(&self, user_id: &str, timezone: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO user_preferences (user_id, timezone) VALUES (?1, ?2) \
             ON CONFLICT (user_id) DO UPDATE SET timezone = EXCLUDED.timezone",
            duckdb::params![user_id, timezone],
        )?;
        Ok(())
    }
}

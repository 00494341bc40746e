/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `TRAFFICLENS_DUCKDB_MEMORY`, default `"1GB"`). The DuckDB default
/// (80% of system RAM) is not acceptable for a server process, so a limit is
/// always set. `SET threads = 2` keeps the background pool small for
/// embedded use.
///
/// The fact relations are `visits` (one row per page visit) and `actions`
/// (zero or more per visit). `ip_lookup` and `user_agents` are the auxiliary
/// relations a report joins only when a requested dimension or an active
/// filter needs them.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- TENANTS
-- ===========================================
CREATE TABLE IF NOT EXISTS tenants (
    id              VARCHAR PRIMARY KEY,           -- the `dkey` a request selects
    name            VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Callers authorised per tenant. `priority` orders a caller's tenants; the
-- first one is used when a request omits `dkey`.
CREATE TABLE IF NOT EXISTS tenant_members (
    user_id         VARCHAR NOT NULL,
    tenant_id       VARCHAR NOT NULL,
    priority        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, tenant_id)
);

CREATE TABLE IF NOT EXISTS user_preferences (
    user_id         VARCHAR PRIMARY KEY,
    timezone        VARCHAR                        -- IANA name or ±HH:MM offset
);

-- ===========================================
-- AUXILIARY LOOKUPS
-- ===========================================
CREATE TABLE IF NOT EXISTS ip_lookup (
    ip              VARCHAR PRIMARY KEY,
    country         VARCHAR,                       -- ISO 3166-1 alpha-2
    iporg           VARCHAR                        -- network organisation
);

CREATE TABLE IF NOT EXISTS user_agents (
    id              VARCHAR PRIMARY KEY,
    device_type     VARCHAR,                       -- 'desktop' | 'mobile' | 'tablet'
    os              VARCHAR,
    browser         VARCHAR
);

-- ===========================================
-- VISITS (page-visit facts)
-- ===========================================
CREATE TABLE IF NOT EXISTS visits (
    id              VARCHAR NOT NULL,              -- UUID v4
    tenant_id       VARCHAR NOT NULL,
    visitor_id      VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL,            -- UTC

    channel         VARCHAR,
    subchannel      VARCHAR,
    keyword         VARCHAR,
    landing_page    VARCHAR,

    ip              VARCHAR,                       -- → ip_lookup.ip
    user_agent_id   VARCHAR,                       -- → user_agents.id

    engaged         BOOLEAN NOT NULL DEFAULT FALSE,
    is_bot          BOOLEAN NOT NULL DEFAULT FALSE,
    is_flagged      BOOLEAN NOT NULL DEFAULT FALSE -- fraud signal
);
CREATE INDEX IF NOT EXISTS idx_visits_tenant_created
    ON visits(tenant_id, created_at);

-- ===========================================
-- ACTIONS (action facts, many per visit)
-- ===========================================
CREATE TABLE IF NOT EXISTS actions (
    id              VARCHAR NOT NULL,
    tenant_id       VARCHAR NOT NULL,
    visit_id        VARCHAR NOT NULL,
    action_type     VARCHAR NOT NULL,              -- 'sale' counts towards sales/revenue
    revenue         DECIMAL(12, 2) NOT NULL DEFAULT 0,
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_actions_tenant_visit
    ON actions(tenant_id, visit_id);
"#
    )
}

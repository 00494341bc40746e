use chrono::{NaiveDate, NaiveDateTime};

use trafficlens_core::dimension::{Dimension, FilterField};
use trafficlens_core::filter::{plan, DateRange, FilterSpec, MatchType, ReportTimezone};
use trafficlens_core::report::{FactFetcher, FactRow};
use trafficlens_duckdb::{DuckDbBackend, NewVisit};

const TENANT: &str = "acme";

fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").expect("timestamp")
}

fn march(start: u32, end: u32) -> DateRange {
    DateRange {
        start: NaiveDate::from_ymd_opt(2026, 3, start).expect("date"),
        end: NaiveDate::from_ymd_opt(2026, 3, end).expect("date"),
        timezone: ReportTimezone::default(),
    }
}

fn visit(channel: Option<&str>, ip: Option<&str>, created_at: &str) -> NewVisit {
    NewVisit {
        visitor_id: "v".to_string(),
        created_at: ts(created_at),
        channel: channel.map(str::to_string),
        ip: ip.map(str::to_string),
        ..NewVisit::default()
    }
}

/// Three channels across two countries, one sale, one bot, one visit
/// outside the default window.
async fn seeded() -> DuckDbBackend {
    let db = DuckDbBackend::open_in_memory().expect("open");
    db.seed_tenant(TENANT, "Acme").await.expect("tenant");
    db.upsert_ip("10.0.0.1", Some("US"), Some("Comcast")).await.expect("ip");
    db.upsert_ip("10.0.0.2", Some("CA"), Some("Rogers")).await.expect("ip");
    db.upsert_user_agent("ua_1", Some("mobile"), Some("iOS"), Some("Safari"))
        .await
        .expect("ua");

    for _ in 0..3 {
        db.insert_visit(TENANT, &visit(Some("email"), Some("10.0.0.1"), "2026-03-02 10:00:00"))
            .await
            .expect("visit");
    }
    let buyer = db
        .insert_visit(
            TENANT,
            &NewVisit {
                engaged: true,
                is_flagged: true,
                user_agent_id: Some("ua_1".to_string()),
                ..visit(Some("email"), Some("10.0.0.2"), "2026-03-03 12:00:00")
            },
        )
        .await
        .expect("visit");
    db.insert_action(TENANT, &buyer, "sale", 19.99, ts("2026-03-03 12:05:00"))
        .await
        .expect("sale");
    db.insert_action(TENANT, &buyer, "sale", 5.01, ts("2026-03-03 12:06:00"))
        .await
        .expect("sale");
    db.insert_action(TENANT, &buyer, "signup", 0.0, ts("2026-03-03 12:07:00"))
        .await
        .expect("signup");

    db.insert_visit(TENANT, &visit(Some("ppc"), Some("10.0.0.1"), "2026-03-04 09:00:00"))
        .await
        .expect("visit");
    db.insert_visit(TENANT, &visit(None, None, "2026-03-05 09:00:00"))
        .await
        .expect("visit");
    db.insert_visit(
        TENANT,
        &NewVisit {
            is_bot: true,
            ..visit(Some("ppc"), Some("10.0.0.2"), "2026-03-05 09:00:00")
        },
    )
    .await
    .expect("bot");
    db.insert_visit(TENANT, &visit(Some("email"), Some("10.0.0.1"), "2026-04-01 09:00:00"))
        .await
        .expect("out of range");
    db.insert_visit("other", &visit(Some("email"), Some("10.0.0.1"), "2026-03-02 10:00:00"))
        .await
        .expect("other tenant");
    db
}

fn find<'a>(rows: &'a [FactRow], values: &[Option<&str>]) -> &'a FactRow {
    rows.iter()
        .find(|r| r.values.iter().map(|v| v.as_deref()).eq(values.iter().copied()))
        .unwrap_or_else(|| panic!("row {values:?} missing from {rows:?}"))
}

#[tokio::test]
async fn groups_by_single_dimension_and_excludes_bots() {
    let db = seeded().await;
    let query = plan(&FilterSpec::default(), &[Dimension::Channel], &march(1, 7));
    let rows = db.fetch(TENANT, &query).await.expect("fetch");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].values, vec![Some("email".to_string())]);
    let email = &rows[0].metrics;
    assert_eq!(email.visitors, 4);
    assert_eq!(email.engaged, 1);
    assert_eq!(email.sales, 2);
    assert_eq!(email.revenue_cents, 2500);
    assert_eq!(email.flagged, 1);

    assert_eq!(find(&rows, &[Some("ppc")]).metrics.visitors, 1);
    assert_eq!(find(&rows, &[None]).metrics.visitors, 1);
}

#[tokio::test]
async fn include_bots_counts_bot_visits() {
    let db = seeded().await;
    let query = plan(&FilterSpec::default(), &[Dimension::Channel], &march(1, 7))
        .with_include_bots(true);
    let rows = db.fetch(TENANT, &query).await.expect("fetch");
    assert_eq!(find(&rows, &[Some("ppc")]).metrics.visitors, 2);
}

#[tokio::test]
async fn joins_geo_for_country_dimension() {
    let db = seeded().await;
    let query = plan(
        &FilterSpec::default(),
        &[Dimension::Channel, Dimension::Country],
        &march(1, 7),
    );
    let rows = db.fetch(TENANT, &query).await.expect("fetch");

    assert_eq!(find(&rows, &[Some("email"), Some("US")]).metrics.visitors, 3);
    assert_eq!(find(&rows, &[Some("email"), Some("CA")]).metrics.sales, 2);
    assert_eq!(find(&rows, &[Some("ppc"), Some("US")]).metrics.visitors, 1);
    assert_eq!(find(&rows, &[None, None]).metrics.visitors, 1);
}

#[tokio::test]
async fn any_match_ors_fields_and_all_match_ands_them() {
    let db = seeded().await;
    let dims = [Dimension::Channel];

    let mut any = FilterSpec::new(MatchType::Any);
    any.insert_raw(FilterField::Channel, "ppc");
    any.insert_raw(FilterField::Country, "CA");
    let rows = db.fetch(TENANT, &plan(&any, &dims, &march(1, 7))).await.expect("any");
    let visitors: u64 = rows.iter().map(|r| r.metrics.visitors).sum();
    assert_eq!(visitors, 2);

    let mut all = FilterSpec::new(MatchType::All);
    all.insert_raw(FilterField::Channel, "email,ppc");
    all.insert_raw(FilterField::Country, "CA");
    let rows = db.fetch(TENANT, &plan(&all, &dims, &march(1, 7))).await.expect("all");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![Some("email".to_string())]);
    assert_eq!(rows[0].metrics.visitors, 1);
}

#[tokio::test]
async fn page_action_filter_matches_visits_with_that_action() {
    let db = seeded().await;
    let mut filters = FilterSpec::default();
    filters.insert_raw(FilterField::PageAction, "signup");
    let rows = db
        .fetch(TENANT, &plan(&filters, &[Dimension::Channel], &march(1, 7)))
        .await
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].metrics.visitors, 1);
    assert_eq!(rows[0].metrics.revenue_cents, 2500);
}

#[tokio::test]
async fn device_dimension_joins_user_agents() {
    let db = seeded().await;
    let rows = db
        .fetch(
            TENANT,
            &plan(&FilterSpec::default(), &[Dimension::DeviceType], &march(1, 7)),
        )
        .await
        .expect("fetch");
    assert_eq!(find(&rows, &[Some("mobile")]).metrics.visitors, 1);
    assert_eq!(find(&rows, &[None]).metrics.visitors, 5);
}

#[tokio::test]
async fn clock_dimensions_follow_report_timezone() {
    let db = DuckDbBackend::open_in_memory().expect("open");
    db.insert_visit(TENANT, &visit(Some("email"), None, "2026-03-02 03:30:00"))
        .await
        .expect("visit");

    let range = DateRange {
        start: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
        end: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
        timezone: ReportTimezone::parse("-05:00").expect("tz"),
    };
    let rows = db
        .fetch(
            TENANT,
            &plan(&FilterSpec::default(), &[Dimension::Date, Dimension::Hour], &range),
        )
        .await
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].values,
        vec![Some("2026-03-01".to_string()), Some("22".to_string())]
    );

    let utc_rows = db
        .fetch(TENANT, &plan(&FilterSpec::default(), &[Dimension::Hour], &march(1, 1)))
        .await
        .expect("fetch");
    assert!(utc_rows.is_empty());
}

#[tokio::test]
async fn fetches_one_row_past_the_limit() {
    let db = seeded().await;
    let query = plan(&FilterSpec::default(), &[Dimension::Channel], &march(1, 7)).with_row_limit(1);
    let rows = db.fetch(TENANT, &query).await.expect("fetch");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].metrics.visitors, 4);
}

#[tokio::test]
async fn other_tenants_are_invisible() {
    let db = seeded().await;
    let rows = db
        .fetch("other", &plan(&FilterSpec::default(), &[Dimension::Channel], &march(1, 7)))
        .await
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].metrics.visitors, 1);
}

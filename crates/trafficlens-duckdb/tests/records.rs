use chrono::{NaiveDate, NaiveDateTime};

use trafficlens_core::dimension::Dimension;
use trafficlens_core::filter::{DateRange, ReportTimezone};
use trafficlens_core::report::{RecordKind, RecordQuery};
use trafficlens_duckdb::{DuckDbBackend, NewVisit};

const TENANT: &str = "acme";

fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").expect("timestamp")
}

fn query(slice: Vec<(Dimension, &str)>, kind: RecordKind) -> RecordQuery {
    RecordQuery {
        range: DateRange {
            start: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
            end: NaiveDate::from_ymd_opt(2026, 3, 7).expect("date"),
            timezone: ReportTimezone::default(),
        },
        slice: slice.into_iter().map(|(d, v)| (d, v.to_string())).collect(),
        kind,
        include_bots: false,
        limit: 50,
        offset: 0,
    }
}

async fn seeded() -> DuckDbBackend {
    let db = DuckDbBackend::open_in_memory().expect("open");
    db.upsert_ip("10.0.0.1", Some("US"), None).await.expect("ip");
    db.upsert_ip("10.0.0.2", Some("CA"), None).await.expect("ip");

    let mk = |channel: Option<&str>, ip: &str, at: &str, engaged: bool| NewVisit {
        visitor_id: format!("visitor-{at}"),
        created_at: ts(at),
        channel: channel.map(str::to_string),
        ip: Some(ip.to_string()),
        engaged,
        ..NewVisit::default()
    };

    db.insert_visit(TENANT, &mk(Some("email"), "10.0.0.1", "2026-03-02 10:00:00", false))
        .await
        .expect("visit");
    let buyer = db
        .insert_visit(TENANT, &mk(Some("email"), "10.0.0.2", "2026-03-03 10:00:00", true))
        .await
        .expect("visit");
    db.insert_action(TENANT, &buyer, "sale", 42.5, ts("2026-03-03 10:05:00"))
        .await
        .expect("sale");
    db.insert_visit(TENANT, &mk(Some("email"), "10.0.0.2", "2026-03-04 10:00:00", true))
        .await
        .expect("visit");
    db.insert_visit(TENANT, &mk(None, "10.0.0.1", "2026-03-05 10:00:00", false))
        .await
        .expect("visit");
    db
}

#[tokio::test]
async fn slices_by_every_constraint_newest_first() {
    let db = seeded().await;
    let page = db
        .list_records(
            TENANT,
            &query(
                vec![(Dimension::Channel, "email"), (Dimension::Country, "CA")],
                RecordKind::Visitors,
            ),
        )
        .await
        .expect("records");
    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].created_at, "2026-03-04T10:00:00Z");
    assert_eq!(page.rows[1].sales, 1);
    assert_eq!(page.rows[1].revenue_cents, 4250);
    assert_eq!(page.rows[1].country.as_deref(), Some("CA"));
}

#[tokio::test]
async fn kind_narrows_to_engaged_or_sales() {
    let db = seeded().await;
    let slice = vec![(Dimension::Channel, "email")];

    let engaged = db
        .list_records(TENANT, &query(slice.clone(), RecordKind::Engaged))
        .await
        .expect("engaged");
    assert_eq!(engaged.total, 2);
    assert!(engaged.rows.iter().all(|r| r.engaged));

    let sales = db
        .list_records(TENANT, &query(slice, RecordKind::Sales))
        .await
        .expect("sales");
    assert_eq!(sales.total, 1);
    assert_eq!(sales.rows[0].sales, 1);
}

#[tokio::test]
async fn unknown_label_matches_missing_values() {
    let db = seeded().await;
    let page = db
        .list_records(
            TENANT,
            &query(vec![(Dimension::Channel, "Unknown")], RecordKind::Visitors),
        )
        .await
        .expect("records");
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].channel, None);
}

#[tokio::test]
async fn pages_through_results() {
    let db = seeded().await;
    let mut q = query(vec![], RecordKind::Visitors);
    q.limit = 3;
    q.offset = 3;
    let page = db.list_records(TENANT, &q).await.expect("records");
    assert_eq!(page.total, 4);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].created_at, "2026-03-02T10:00:00Z");
}

use reqwest::StatusCode;

use chrono::{Duration, Utc};

use uuid::Uuid;

use fanfest_signup::model::SignupRecord;

use crate::helpers::TestApp;

#[tokio::test]
async fn health_reports_healthy_store() {
    let app = TestApp::spawn().await;

    let res = app.health_check().await.expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.expect("Failed to parse body");
    assert_eq!("healthy", body["status"]);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_reports_unreachable_store() {
    let app = TestApp::spawn().await;
    app.signups.set_failing(true);

    let res = app.health_check().await.expect("Failed to execute request");

    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, res.status());
    let body: serde_json::Value = res.json().await.expect("Failed to parse body");
    assert_eq!("unhealthy", body["status"]);
    assert!(body["error"].is_string());
}

fn seeded_record(created_at: chrono::DateTime<Utc>) -> SignupRecord {
    SignupRecord {
        id: Uuid::new_v4(),
        name: "Seeded Fan".into(),
        email: format!("{}@example.com", Uuid::new_v4()),
        phone: None,
        zip_code: "64105".into(),
        events_interested: vec!["Kids Zone Activities".into()],
        ip_address: None,
        user_agent: None,
        source_url: None,
        sms_sent: false,
        sms_sent_at: None,
        sms_delivery_status: None,
        created_at,
        updated_at: created_at,
    }
}

#[tokio::test]
async fn metrics_match_stored_records() {
    let app = TestApp::spawn().await;
    let now = Utc::now();
    for _ in 0..3 {
        app.signups.seed(seeded_record(now)).await;
    }
    for days in 2..4 {
        app.signups
            .seed(seeded_record(now - Duration::days(days)))
            .await;
    }

    let res = app.metrics().await.expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.expect("Failed to parse body");
    assert_eq!(5, body["totalSignups"]);
    assert_eq!(3, body["todaySignups"]);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn metrics_are_not_found_when_disabled() {
    let app = TestApp::spawn_with(|settings| settings.app.metrics_enabled = false).await;

    let res = app.metrics().await.expect("Failed to execute request");

    assert_eq!(StatusCode::NOT_FOUND, res.status());
}

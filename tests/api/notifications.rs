use reqwest::StatusCode;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use fanfest_signup::model::DeliveryStatus;
use fanfest_signup::worker::JobOutcome;

use crate::helpers::{redirected_signup_id, NewSignup, TestApp};

fn accepted() -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(serde_json::json!({
        "sid": "SM0123456789",
        "status": "queued",
    }))
}

async fn signup_with_phone(app: &TestApp, phone: &str) -> uuid::Uuid {
    let res = app
        .signup_create(&NewSignup::valid("fan@example.com").with_phone(phone))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::FOUND, res.status());
    redirected_signup_id(&res)
}

#[tokio::test]
async fn signup_with_phone_gets_a_confirmation_text() {
    let app = TestApp::spawn().await;

    Mock::given(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .and(method("POST"))
        .and(body_string_contains("To=%2B15551234567"))
        .and(body_string_contains("Test+Fan"))
        .respond_with(accepted())
        .expect(1)
        .mount(&app.sms_server)
        .await;

    let id = signup_with_phone(&app, "555.123.4567").await;

    assert_eq!(vec![JobOutcome::Sent], app.dispatch_notifications().await);

    let record = app.signups.records().await.remove(0);
    assert_eq!(id, record.id);
    assert!(record.sms_sent);
    assert!(record.sms_sent_at.is_some());
    assert_eq!(Some(DeliveryStatus::Sent), record.delivery_status());
}

#[tokio::test]
async fn signup_without_phone_sends_nothing() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(accepted())
        .expect(0)
        .mount(&app.sms_server)
        .await;

    let res = app
        .signup_create(&NewSignup::valid("fan@example.com"))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::FOUND, res.status());

    assert!(app.dispatch_notifications().await.is_empty());
}

#[tokio::test]
async fn undeliverable_phone_is_marked_failed() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(accepted())
        .expect(0)
        .mount(&app.sms_server)
        .await;

    // Passes the form's length check but is not a domestic number
    signup_with_phone(&app, "12345").await;

    assert_eq!(
        vec![JobOutcome::InvalidPhone],
        app.dispatch_notifications().await
    );
    let record = app.signups.records().await.remove(0);
    assert!(!record.sms_sent);
    assert_eq!(Some(DeliveryStatus::Failed), record.delivery_status());
}

#[tokio::test]
async fn rejected_destination_is_not_retried() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid To number"))
        .expect(1)
        .mount(&app.sms_server)
        .await;

    signup_with_phone(&app, "5551234567").await;

    assert_eq!(vec![JobOutcome::Rejected], app.dispatch_notifications().await);
    let record = app.signups.records().await.remove(0);
    assert_eq!(Some(DeliveryStatus::Failed), record.delivery_status());
}

#[tokio::test]
async fn carrier_outage_is_retried_until_attempts_run_out() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&app.sms_server)
        .await;

    signup_with_phone(&app, "5551234567").await;

    assert_eq!(
        vec![
            JobOutcome::Retrying,
            JobOutcome::Retrying,
            JobOutcome::Exhausted
        ],
        app.dispatch_notifications().await
    );
    let record = app.signups.records().await.remove(0);
    assert!(!record.sms_sent);
    assert_eq!(Some(DeliveryStatus::Failed), record.delivery_status());
    assert_eq!(1, app.queue.dead_letters().await.len());
}

#[tokio::test]
async fn carrier_recovery_delivers_on_retry() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.sms_server)
        .await;
    Mock::given(any())
        .respond_with(accepted())
        .expect(1)
        .mount(&app.sms_server)
        .await;

    signup_with_phone(&app, "+1 (555) 123-4567").await;

    assert_eq!(
        vec![JobOutcome::Retrying, JobOutcome::Sent],
        app.dispatch_notifications().await
    );
    assert!(app.signups.records().await.remove(0).sms_sent);
}

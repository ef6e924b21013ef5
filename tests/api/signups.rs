use reqwest::StatusCode;

use fanfest_signup::model::NotificationJob;

use crate::helpers::{redirected_signup_id, NewSignup, TestApp};

#[tokio::test]
async fn form_lists_catalog_events() {
    let app = TestApp::spawn_with(|settings| {
        settings.events.catalog = "Opening Match Watch Party, Closing Ceremony".into();
    })
    .await;

    let res = app.signup_form().await.expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body = res.text().await.unwrap();
    assert!(body.contains("Kansas City FIFA Fan Fest Signup"));
    assert!(body.contains("Opening Match Watch Party"));
    assert!(body.contains("Closing Ceremony"));
    assert!(!body.contains("Kids Zone Activities"));
}

#[tokio::test]
async fn create_redirects_to_success_page_for_valid_form() {
    let app = TestApp::spawn().await;
    let new_signup = NewSignup::valid("Fan@Example.com");

    let res = app
        .signup_create(&new_signup)
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::FOUND, res.status());
    let id = redirected_signup_id(&res);

    let records = app.signups.records().await;
    assert_eq!(1, records.len());
    assert_eq!(id, records[0].id);
    assert_eq!("fan@example.com", records[0].email);
    assert_eq!("Test Fan", records[0].name);
    assert!(app.queue.pending().await.is_empty());

    let res = app
        .signup_success(&id.to_string())
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());
    let body = res.text().await.unwrap();
    assert!(body.contains("Test Fan"));
    assert!(body.contains("fan@example.com"));
}

#[tokio::test]
async fn create_with_phone_enqueues_notification() {
    let app = TestApp::spawn().await;
    let new_signup = NewSignup::valid("fan@example.com").with_phone("(555) 123-4567");

    let res = app
        .signup_create(&new_signup)
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::FOUND, res.status());
    let id = redirected_signup_id(&res);
    assert_eq!(
        vec![NotificationJob {
            signup_id: id,
            phone: "(555) 123-4567".into(),
            name: "Test Fan".into(),
        }],
        app.queue.pending().await
    );
}

#[tokio::test]
async fn create_records_tracking_attributes() {
    let app = TestApp::spawn().await;

    let res = app
        .request(reqwest::Method::POST, "signup")
        .header("User-Agent", "fanfest-test/1.0")
        .header("Referer", "https://example.com/worldcup")
        .header("X-Forwarded-For", "203.0.113.9")
        .form(&[
            ("name", "Test Fan"),
            ("email", "fan@example.com"),
            ("zip_code", "64105"),
            ("events_interested", "Photo Booth Experience"),
        ])
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::FOUND, res.status());
    let record = app.signups.records().await.remove(0);
    assert_eq!(Some("203.0.113.9".to_string()), record.ip_address);
    assert_eq!(Some("fanfest-test/1.0".to_string()), record.user_agent);
    assert_eq!(
        Some("https://example.com/worldcup".to_string()),
        record.source_url
    );
}

#[tokio::test]
async fn create_rerenders_form_for_invalid_fields() {
    let app = TestApp::spawn().await;
    let test_cases = vec![
        (
            NewSignup {
                name: "".into(),
                ..NewSignup::valid("fan@example.com")
            },
            "name-errors",
            "Name is required",
        ),
        (
            NewSignup {
                name: "X".into(),
                ..NewSignup::valid("fan@example.com")
            },
            "name-errors",
            "Name must be between 2 and 100 characters",
        ),
        (
            NewSignup::valid("not-an-email"),
            "email-errors",
            "Please enter a valid email address",
        ),
        (
            NewSignup::valid("fan@example.com").with_phone("555-123-4567-555-123-4567"),
            "phone-errors",
            "Phone number is too long",
        ),
        (
            NewSignup {
                zip_code: "641".into(),
                ..NewSignup::valid("fan@example.com")
            },
            "zip_code-errors",
            "Please enter a valid zip code",
        ),
        (
            NewSignup {
                events_interested: vec![],
                ..NewSignup::valid("fan@example.com")
            },
            "events_interested-errors",
            "Please select at least one event",
        ),
        (
            NewSignup {
                events_interested: vec!["Free Tickets".into()],
                ..NewSignup::valid("fan@example.com")
            },
            "events_interested-errors",
            "is not a valid choice",
        ),
    ];

    for (new_signup, error_list, message) in test_cases {
        let res = app
            .signup_create(&new_signup)
            .await
            .expect("Failed to execute request");

        assert_eq!(
            StatusCode::OK,
            res.status(),
            "The API did not re-render the form for {}",
            error_list
        );
        let body = res.text().await.unwrap();
        assert!(body.contains(error_list), "Missing {} in form", error_list);
        assert!(body.contains(message), "Missing '{}' in form", message);
    }

    assert!(app.signups.records().await.is_empty());
    assert!(!app.dedupe.is_marked("email_check:fan@example.com").await);
}

#[tokio::test]
async fn create_rejects_repeated_email_as_duplicate() {
    let app = TestApp::spawn().await;

    let first = app
        .signup_create(&NewSignup::valid("fan@example.com"))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::FOUND, first.status());

    let second = app
        .signup_create(&NewSignup::valid(" FAN@example.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, second.status());
    let body = second.text().await.unwrap();
    assert!(body.contains("This email has already been registered."));
    assert_eq!(1, app.signups.records().await.len());
}

#[tokio::test]
async fn create_fails_with_500_if_store_is_unavailable() {
    let app = TestApp::spawn().await;
    app.signups.set_failing(true);

    let res = app
        .signup_create(&NewSignup::valid("fan@example.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, res.status());
    let body = res.text().await.unwrap();
    assert!(body.contains("Something went wrong"));

    // The marker was released, so a retry goes through once the store is back
    app.signups.set_failing(false);
    let res = app
        .signup_create(&NewSignup::valid("fan@example.com"))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::FOUND, res.status());
}

#[tokio::test]
async fn create_is_rate_limited() {
    let app = TestApp::spawn_with(|settings| settings.rate_limit.submit_per_minute = 3).await;

    for i in 0..3 {
        let res = app
            .signup_create(&NewSignup::valid(&format!("fan{}@example.com", i)))
            .await
            .expect("Failed to execute request");
        assert_eq!(StatusCode::FOUND, res.status());
    }

    // Over the limit, even for a submission that would fail validation
    let res = app
        .signup_create(&NewSignup::valid("not-an-email"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::TOO_MANY_REQUESTS, res.status());
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(3, app.signups.records().await.len());

    // Views have their own budget
    let res = app.signup_form().await.expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());
}

#[tokio::test]
async fn form_views_are_rate_limited() {
    let app = TestApp::spawn_with(|settings| settings.rate_limit.view_per_minute = 2).await;

    for _ in 0..2 {
        let res = app.signup_form().await.expect("Failed to execute request");
        assert_eq!(StatusCode::OK, res.status());
    }

    let res = app.signup_form().await.expect("Failed to execute request");
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, res.status());
}

#[tokio::test]
async fn forwarded_header_does_not_reset_submit_limit() {
    let app = TestApp::spawn_with(|settings| settings.rate_limit.submit_per_minute = 3).await;

    let mut statuses = Vec::new();
    for i in 0..4 {
        let res = app
            .request(reqwest::Method::POST, "signup")
            .header("X-Forwarded-For", format!("198.51.100.{}", i))
            .form(&[
                ("name", "Test Fan"),
                ("email", format!("fan{}@example.com", i).as_str()),
                ("zip_code", "64105"),
                ("events_interested", "Photo Booth Experience"),
            ])
            .send()
            .await
            .expect("Failed to execute request");
        statuses.push(res.status());
    }

    assert_eq!(
        vec![
            StatusCode::FOUND,
            StatusCode::FOUND,
            StatusCode::FOUND,
            StatusCode::TOO_MANY_REQUESTS
        ],
        statuses
    );
    assert_eq!(3, app.signups.records().await.len());
    // Still recorded as the tracking address
    assert!(app
        .signups
        .records()
        .await
        .iter()
        .all(|record| record
            .ip_address
            .as_deref()
            .map_or(false, |ip| ip.starts_with("198.51.100."))));
}

#[tokio::test]
async fn success_page_has_its_own_limit() {
    let app = TestApp::spawn_with(|settings| settings.rate_limit.confirmation_per_minute = 1).await;
    let res = app
        .signup_create(&NewSignup::valid("fan@example.com"))
        .await
        .expect("Failed to execute request");
    let id = redirected_signup_id(&res).to_string();

    let res = app.signup_success(&id).await.expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let res = app.signup_success(&id).await.expect("Failed to execute request");
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, res.status());

    let res = app.signup_form().await.expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());
}

#[tokio::test]
async fn success_page_is_not_found_for_unknown_id() {
    let app = TestApp::spawn().await;

    let res = app
        .signup_success(&uuid::Uuid::new_v4().to_string())
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    let res = app
        .signup_success("not-a-signup-id")
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::NOT_FOUND, res.status());
}

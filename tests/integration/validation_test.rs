use crate::{
    build_app,
    fake_platform::{self, PRODUCT_ID, SANDBOX_RECEIPT, SLOW_RECEIPT},
    post_json, setup_test_environment, test_config,
};
use axum::http::StatusCode;
use std::time::{Duration, Instant};

fn ios_body(receipt: &str) -> String {
    serde_json::json!({
        "platform": "ios",
        "productId": PRODUCT_ID,
        "receipt": receipt,
    })
    .to_string()
}

fn android_body(token: &str) -> String {
    serde_json::json!({
        "platform": "android",
        "productId": "pro_monthly",
        "packageName": "com.app",
        "purchaseToken": token,
        "isSubscription": true,
        "userId": "user-1",
    })
    .to_string()
}

#[tokio::test]
async fn ios_production_receipt_is_valid() {
    setup_test_environment().await;
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let (status, body) = post_json(app, "/validate-receipt", &ios_body("cHJvZA==")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], true);
    assert!(body.get("reason").is_none());
    assert_eq!(body["expiryDate"], platform.expiry_ms());
    assert_eq!(platform.calls(), vec!["apple:prod"]);
}

#[tokio::test]
async fn ios_sandbox_receipt_is_retried_against_sandbox_once() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let (status, body) = post_json(app, "/validate-receipt", &ios_body(SANDBOX_RECEIPT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], true);
    assert_eq!(platform.calls(), vec!["apple:prod", "apple:sandbox"]);
}

#[tokio::test]
async fn slow_platform_reports_timeout_inside_200() {
    let (addr, _platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 200), false);
    let started = Instant::now();

    let (status, body) = post_json(app, "/validate-receipt", &ios_body(SLOW_RECEIPT)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], false);
    assert_eq!(body["reason"], "timeout");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn android_subscription_round_trip() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), true);

    let (status, body) = post_json(app, "/validate-receipt", &android_body("active-token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], true, "{}", body);
    assert!(body["expiryDate"].is_i64());
    assert_eq!(platform.calls(), vec!["oauth:token", "play:subscriptions"]);
}

#[tokio::test]
async fn android_canceled_purchase_is_invalid() {
    let (addr, _platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), true);

    let (status, body) = post_json(app, "/validate-receipt", &android_body("canceled")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], false);
    assert_eq!(body["reason"], "purchase invalid or canceled");
}

#[tokio::test]
async fn android_expired_and_missing_purchases() {
    let (addr, _platform) = fake_platform::spawn().await;

    let app = build_app(test_config(addr, 2_000), true);
    let (_, expired) = post_json(app, "/validate-receipt", &android_body("expired")).await;
    assert_eq!(expired["reason"], "subscription expired");

    let app = build_app(test_config(addr, 2_000), true);
    let (status, missing) = post_json(app, "/validate-receipt", &android_body("missing")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(missing["reason"], "platform API error: 404");
}

#[tokio::test]
async fn android_without_service_account_reports_configuration() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let (status, body) = post_json(app, "/validate-receipt", &android_body("active-token")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "configuration missing");
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn concurrent_identical_requests_yield_identical_results() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let body = ios_body("cHJvZA==");
    let results = futures::future::join_all(
        (0..4).map(|_| post_json(app.clone(), "/validate-receipt", &body)),
    )
    .await;

    let (first_status, first_body) = &results[0];
    assert_eq!(*first_status, StatusCode::OK);
    assert_eq!(first_body["isValid"], true);
    assert_eq!(first_body["expiryDate"], platform.expiry_ms());

    for (status, body) in &results[1..] {
        assert_eq!(status, first_status);
        assert_eq!(body, first_body);
    }
    assert_eq!(platform.calls().len(), 4);
}

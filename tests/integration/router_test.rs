use crate::{build_app, fake_platform, post_json, test_config};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn missing_platform_is_bad_request_without_platform_calls() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), true);

    let (status, body) = post_json(
        app,
        "/validate-receipt",
        r#"{"productId":"com.app.pro.monthly","receipt":"cmVjZWlwdA=="}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "isValid": false, "reason": "missing parameters: platform" })
    );
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn android_without_token_is_bad_request() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), true);

    let (status, body) = post_json(
        app,
        "/validate-receipt",
        r#"{"platform":"android","productId":"pro","packageName":"com.app"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "missing parameters: purchaseToken");
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (addr, _platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), true);

    let (status, body) = post_json(app, "/validate-receipt", r#"{"platform": "ios""#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["isValid"], false);
    assert!(body["reason"]
        .as_str()
        .unwrap()
        .starts_with("malformed request body"));
}

#[tokio::test]
async fn unknown_platform_is_bad_request() {
    let (addr, _platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), true);

    let (status, body) = post_json(
        app,
        "/api/v1/receipts/validate",
        r#"{"platform":"blackberry","productId":"pro"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "unknown platform: blackberry");
}

#[tokio::test]
async fn health_reports_ok() {
    let (addr, _platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let (addr, _platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/validate-receipt")
                .header("origin", "https://admin.example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type,apikey")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn oversized_body_gets_json_bad_request() {
    let (addr, platform) = fake_platform::spawn().await;
    let app = build_app(test_config(addr, 2_000), false);

    let receipt = "A".repeat(3 * 1024 * 1024);
    let body = json!({ "platform": "ios", "productId": "pro", "receipt": receipt }).to_string();
    let (status, body) = post_json(app, "/validate-receipt", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["isValid"], false);
    assert!(body["reason"]
        .as_str()
        .unwrap()
        .starts_with("unreadable request body"));
    assert!(platform.calls().is_empty());
}

//! Local stand-in for the App Store and Play Developer endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Receipt the fake production endpoint answers with 21007
pub const SANDBOX_RECEIPT: &str = "c2FuZGJveA==";
/// Receipt whose verification never completes in time
pub const SLOW_RECEIPT: &str = "c2xvdw==";
pub const PRODUCT_ID: &str = "com.app.pro.monthly";

/// Records calls; every active purchase expires at the same instant per spawn
#[derive(Clone)]
pub struct FakePlatform {
    calls: Arc<Mutex<Vec<String>>>,
    expiry_ms: i64,
}

impl FakePlatform {
    pub fn expiry_ms(&self) -> i64 {
        self.expiry_ms
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn hit(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

fn future_ms() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    now.as_millis() as i64 + 86_400_000
}

/// Spawn the fake platform on an ephemeral port
pub async fn spawn() -> (SocketAddr, FakePlatform) {
    let platform = FakePlatform {
        calls: Arc::default(),
        expiry_ms: future_ms(),
    };

    let app = Router::new()
        .route("/apple/prod", post(apple_production))
        .route("/apple/sandbox", post(apple_sandbox))
        .route("/oauth/token", post(oauth_token))
        .route(
            "/play/androidpublisher/v3/applications/{package}/purchases/{kind}/{product}/tokens/{token}",
            get(play_purchase),
        )
        .with_state(platform.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, platform)
}

fn subscription_receipt(expiry_ms: i64) -> Value {
    json!({
        "status": 0,
        "latest_receipt_info": [
            { "product_id": PRODUCT_ID, "expires_date_ms": expiry_ms.to_string() }
        ]
    })
}

async fn apple_production(State(platform): State<FakePlatform>, Json(body): Json<Value>) -> Json<Value> {
    platform.hit("apple:prod");
    match body["receipt-data"].as_str() {
        Some(SANDBOX_RECEIPT) => Json(json!({ "status": 21007 })),
        Some(SLOW_RECEIPT) => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "status": 0 }))
        }
        Some(_) => Json(subscription_receipt(platform.expiry_ms)),
        None => Json(json!({ "status": 21002 })),
    }
}

async fn apple_sandbox(State(platform): State<FakePlatform>, Json(_body): Json<Value>) -> Json<Value> {
    platform.hit("apple:sandbox");
    Json(subscription_receipt(platform.expiry_ms))
}

async fn oauth_token(
    State(platform): State<FakePlatform>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    platform.hit("oauth:token");
    let grant_ok = form.get("grant_type").map(String::as_str)
        == Some("urn:ietf:params:oauth:grant-type:jwt-bearer");
    let has_assertion = form.get("assertion").is_some_and(|a| a.split('.').count() == 3);

    if grant_ok && has_assertion {
        (
            StatusCode::OK,
            Json(json!({ "access_token": "fake-access-token", "expires_in": 3599, "token_type": "Bearer" })),
        )
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })))
    }
}

async fn play_purchase(
    State(platform): State<FakePlatform>,
    Path((_package, kind, _product, token)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    platform.hit(&format!("play:{}", kind));

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer fake-access-token");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })));
    }

    let body = match token.as_str() {
        "expired" => json!({ "purchaseState": 0, "expiryTimeMillis": "1500000000000" }),
        "canceled" => json!({ "purchaseState": 1, "expiryTimeMillis": platform.expiry_ms.to_string() }),
        "missing" => return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))),
        _ => json!({ "purchaseState": 0, "expiryTimeMillis": platform.expiry_ms.to_string() }),
    };

    (StatusCode::OK, Json(body))
}

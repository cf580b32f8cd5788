use crate::{
    config::AppleConfig,
    models::receipt::{Rejection, ValidationResult},
    services::transport::{execute_with_timeout, HttpRequest, HttpTransport, TransportError},
    utils,
};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

/// verifyReceipt status for a sandbox receipt sent to production
const STATUS_SANDBOX_RECEIPT: i64 = 21007;
/// verifyReceipt status for a production receipt sent to sandbox
const STATUS_PRODUCTION_RECEIPT: i64 = 21008;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppleEnvironment {
    Production,
    Sandbox,
}

#[derive(Debug, Deserialize)]
struct AppleReceiptResponse {
    status: i64,
    receipt: Option<AppleReceipt>,
    latest_receipt_info: Option<Vec<AppleTransaction>>,
}

#[derive(Debug, Deserialize)]
struct AppleReceipt {
    #[serde(default)]
    in_app: Option<Vec<AppleTransaction>>,
}

#[derive(Debug, Deserialize)]
struct AppleTransaction {
    product_id: String,
    #[serde(default)]
    expires_date_ms: Option<String>,
}

pub struct AppleService {
    transport: Arc<dyn HttpTransport>,
    production_url: String,
    sandbox_url: String,
    shared_secret: Option<String>,
    sandbox_first: bool,
    timeout: Duration,
}

impl AppleService {
    pub fn new(config: &AppleConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            production_url: config.production_url.clone(),
            sandbox_url: config.sandbox_url.clone(),
            shared_secret: config.shared_secret.clone().filter(|s| !s.is_empty()),
            sandbox_first: config.sandbox_first(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Verify an App Store receipt contains an active purchase of `product_id`
    #[instrument(skip(self, receipt))]
    pub async fn validate(&self, receipt: &str, product_id: &str) -> ValidationResult {
        let response = match self.verify(receipt).await {
            Ok(response) => response,
            Err(TransportError::Timeout) => return ValidationResult::invalid(Rejection::Timeout),
            Err(e) => return ValidationResult::invalid(Rejection::Network(e.to_string())),
        };

        if response.status != 0 {
            warn!("Apple rejected receipt with status {}", response.status);
            return ValidationResult::invalid(Rejection::PlatformStatus(response.status));
        }

        let Some(transaction) = Self::find_transaction(&response, product_id) else {
            return ValidationResult::invalid(Rejection::ProductNotFound);
        };

        let result = match transaction.expires_date_ms.as_deref() {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(expires_ms) => ValidationResult::until(expires_ms, utils::now_millis()),
                Err(_) => ValidationResult::invalid(Rejection::Network(format!(
                    "malformed response: expires_date_ms {:?}",
                    raw
                ))),
            },
            None => ValidationResult::valid(),
        };

        info!(
            product_id = product_id,
            is_valid = result.is_valid(),
            expiry_date = ?result.expiry_date(),
            "Apple receipt verified"
        );

        result
    }

    /// POST the receipt, following at most one environment redirect
    async fn verify(&self, receipt: &str) -> Result<AppleReceiptResponse, TransportError> {
        let mut body = serde_json::json!({ "receipt-data": receipt });
        if let Some(secret) = &self.shared_secret {
            body["password"] = serde_json::Value::String(secret.clone());
        }

        let first = if self.sandbox_first {
            AppleEnvironment::Sandbox
        } else {
            AppleEnvironment::Production
        };

        let response = self.post(first, &body).await?;

        let redirect = match (first, response.status) {
            (AppleEnvironment::Production, STATUS_SANDBOX_RECEIPT) => Some(AppleEnvironment::Sandbox),
            (AppleEnvironment::Sandbox, STATUS_PRODUCTION_RECEIPT) => {
                Some(AppleEnvironment::Production)
            }
            _ => None,
        };

        match redirect {
            Some(environment) => {
                debug!(
                    "Receipt belongs to {:?} (status {}), retrying once",
                    environment, response.status
                );
                self.post(environment, &body).await
            }
            None => Ok(response),
        }
    }

    async fn post(
        &self,
        environment: AppleEnvironment,
        body: &serde_json::Value,
    ) -> Result<AppleReceiptResponse, TransportError> {
        let url = match environment {
            AppleEnvironment::Production => &self.production_url,
            AppleEnvironment::Sandbox => &self.sandbox_url,
        };

        let request = HttpRequest::post_json(url.clone(), body.clone());
        let response = execute_with_timeout(self.transport.as_ref(), request, self.timeout).await?;

        response.json()
    }

    /// First entry for `product_id`
    ///
    /// `in_app` is only consulted when `latest_receipt_info` is absent.
    fn find_transaction<'a>(
        response: &'a AppleReceiptResponse,
        product_id: &str,
    ) -> Option<&'a AppleTransaction> {
        let transactions = match &response.latest_receipt_info {
            Some(latest) => Some(latest),
            None => response.receipt.as_ref().and_then(|r| r.in_app.as_ref()),
        };

        transactions?
            .iter()
            .find(|transaction| transaction.product_id == product_id)
    }
}

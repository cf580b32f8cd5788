use crate::{
    config::GoogleConfig,
    models::receipt::{Rejection, ValidationResult},
    services::{
        token_service::{ServiceAccountCredential, TokenError, TokenService},
        transport::{execute_with_timeout, HttpRequest, HttpTransport, TransportError},
    },
    utils,
};
use reqwest::Url;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, instrument, warn};

/// `purchaseState` value for a completed purchase
const PURCHASE_STATE_PURCHASED: i64 = 0;

/// Subset of the Play Developer API purchase resources we inspect
///
/// Numeric fields arrive as JSON numbers; millisecond timestamps as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePurchase {
    #[serde(default)]
    purchase_state: Option<i64>,
    #[serde(default)]
    expiry_time_millis: Option<String>,
}

/// Identifies one purchase to look up
#[derive(Debug, Clone, Copy)]
pub struct AndroidPurchase<'a> {
    pub package_name: &'a str,
    pub product_id: &'a str,
    pub purchase_token: &'a str,
    pub is_subscription: bool,
}

pub struct GoogleService {
    transport: Arc<dyn HttpTransport>,
    token_service: TokenService,
    credential: Option<ServiceAccountCredential>,
    api_base: String,
    timeout: Duration,
}

impl GoogleService {
    pub fn new(
        config: &GoogleConfig,
        credential: Option<ServiceAccountCredential>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            token_service: TokenService::new(config, transport.clone()),
            transport,
            credential,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// Verify a Play purchase token is an active purchase of the product
    #[instrument(skip(self, purchase), fields(
        package_name = purchase.package_name,
        product_id = purchase.product_id,
        is_subscription = purchase.is_subscription,
    ))]
    pub async fn validate(&self, purchase: AndroidPurchase<'_>) -> ValidationResult {
        let Some(credential) = &self.credential else {
            error!("Google service account credential is not configured");
            return ValidationResult::invalid(Rejection::ConfigurationMissing);
        };

        let access_token = match self.token_service.get_access_token(credential).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to obtain Google access token: {}", e);
                return ValidationResult::invalid(Self::token_rejection(e));
            }
        };

        let url = match self.purchase_url(&purchase) {
            Ok(url) => url,
            Err(e) => return ValidationResult::invalid(Rejection::Validation(e)),
        };

        let request = HttpRequest::get(url).bearer(&access_token.token);
        let response = match execute_with_timeout(self.transport.as_ref(), request, self.timeout).await
        {
            Ok(response) => response,
            Err(e) => return ValidationResult::invalid(Self::transport_rejection(e)),
        };

        if !response.is_success() {
            warn!("Play Developer API returned {}", response.status);
            return ValidationResult::invalid(Rejection::PlatformApi(response.status));
        }

        let resource: GooglePurchase = match response.json() {
            Ok(resource) => resource,
            Err(e) => return ValidationResult::invalid(Self::transport_rejection(e)),
        };

        let result = Self::evaluate(&resource, purchase.is_subscription, utils::now_millis());

        info!(
            is_valid = result.is_valid(),
            expiry_date = ?result.expiry_date(),
            "Google purchase verified"
        );

        result
    }

    fn evaluate(resource: &GooglePurchase, is_subscription: bool, now_ms: i64) -> ValidationResult {
        // A missing purchaseState is not a completed purchase
        if resource.purchase_state != Some(PURCHASE_STATE_PURCHASED) {
            return ValidationResult::invalid(Rejection::PurchaseNotActive);
        }

        if !is_subscription {
            return ValidationResult::valid();
        }

        match resource.expiry_time_millis.as_deref() {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(expiry_ms) => ValidationResult::until(expiry_ms, now_ms),
                Err(_) => ValidationResult::invalid(Rejection::Validation(format!(
                    "unparseable expiryTimeMillis {:?}",
                    raw
                ))),
            },
            None => ValidationResult::valid(),
        }
    }

    fn purchase_url(&self, purchase: &AndroidPurchase<'_>) -> Result<String, String> {
        let mut url =
            Url::parse(&self.api_base).map_err(|e| format!("invalid API base URL: {}", e))?;
        let kind = if purchase.is_subscription {
            "subscriptions"
        } else {
            "products"
        };

        url.path_segments_mut()
            .map_err(|_| "API base URL cannot carry a path".to_string())?
            .extend([
                "applications",
                purchase.package_name,
                "purchases",
                kind,
                purchase.product_id,
                "tokens",
                purchase.purchase_token,
            ]);

        Ok(url.to_string())
    }

    fn token_rejection(error: TokenError) -> Rejection {
        match error {
            TokenError::InvalidKey(_) => Rejection::ConfigurationMissing,
            TokenError::MissingToken | TokenError::InvalidLifetime(_) => {
                Rejection::TokenUnavailable
            }
            TokenError::Rejected(_) => Rejection::NoAccessToken,
            TokenError::Transport(e) => Self::transport_rejection(e),
        }
    }

    fn transport_rejection(error: TransportError) -> Rejection {
        match error {
            TransportError::Timeout => Rejection::Timeout,
            e => Rejection::Network(e.to_string()),
        }
    }
}

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

use super::common::Platform;
use crate::{error::ApiError, utils};

/// Receipt validation request body as sent by the mobile client
///
/// Every field is optional on the wire so that a missing field becomes a
/// descriptive 400 instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptValidationBody {
    pub platform: Option<String>,
    #[validate(length(max = 255))]
    pub product_id: Option<String>,
    #[validate(length(max = 1048576))]
    pub receipt: Option<String>,
    #[validate(length(max = 255))]
    pub package_name: Option<String>,
    #[validate(length(max = 4096))]
    pub purchase_token: Option<String>,
    pub is_subscription: Option<bool>,
    #[validate(length(max = 255))]
    pub user_id: Option<String>,
}

/// Platform-specific part of a validation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformPayload {
    Ios {
        receipt: String,
    },
    Android {
        package_name: String,
        purchase_token: String,
        is_subscription: bool,
    },
}

/// A well-formed, single-use validation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub product_id: String,
    pub payload: PlatformPayload,
    pub user_id: Option<String>,
}

impl ValidationRequest {
    pub fn platform(&self) -> Platform {
        match self.payload {
            PlatformPayload::Ios { .. } => Platform::Ios,
            PlatformPayload::Android { .. } => Platform::Android,
        }
    }

    /// Stable identity of the purchase being validated
    pub fn fingerprint(&self) -> String {
        match &self.payload {
            PlatformPayload::Ios { receipt } => {
                utils::fingerprint(&["ios", &self.product_id, receipt])
            }
            PlatformPayload::Android {
                package_name,
                purchase_token,
                ..
            } => utils::fingerprint(&["android", package_name, &self.product_id, purchase_token]),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing parameters: {}", field)))
}

impl TryFrom<ReceiptValidationBody> for ValidationRequest {
    type Error = ApiError;

    fn try_from(body: ReceiptValidationBody) -> Result<Self, Self::Error> {
        body.validate()
            .map_err(|e| ApiError::BadRequest(format!("validation error: {}", e)))?;

        let platform_raw = required(body.platform, "platform")?;
        let product_id = required(body.product_id, "productId")?;

        let platform = Platform::from_str(&platform_raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown platform: {}", platform_raw)))?;

        let payload = match platform {
            Platform::Ios => {
                let receipt = required(body.receipt, "receipt")?;
                let compact: String = receipt.chars().filter(|c| !c.is_whitespace()).collect();
                if STANDARD.decode(compact.as_bytes()).is_err() {
                    return Err(ApiError::BadRequest(
                        "malformed receipt: expected base64 data".to_string(),
                    ));
                }
                PlatformPayload::Ios { receipt }
            }
            Platform::Android => PlatformPayload::Android {
                package_name: required(body.package_name, "packageName")?,
                purchase_token: required(body.purchase_token, "purchaseToken")?,
                is_subscription: body.is_subscription.unwrap_or(true),
            },
        };

        Ok(Self {
            product_id,
            payload,
            user_id: body.user_id.filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Why a purchase was not accepted
///
/// The `Display` output is the human-readable reason returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("subscription expired")]
    Expired,

    #[error("product not found in receipt")]
    ProductNotFound,

    #[error("platform status: {0}")]
    PlatformStatus(i64),

    #[error("platform API error: {0}")]
    PlatformApi(u16),

    #[error("purchase invalid or canceled")]
    PurchaseNotActive,

    #[error("no access token")]
    NoAccessToken,

    #[error("unable to obtain access token")]
    TokenUnavailable,

    #[error("configuration missing")]
    ConfigurationMissing,

    #[error("timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Normalized outcome of a platform validation
///
/// A valid result never carries a reason and an invalid one always does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid { expiry_date: Option<i64> },
    Invalid(Rejection),
}

impl ValidationResult {
    /// Valid one-time purchase without expiry
    pub fn valid() -> Self {
        Self::Valid { expiry_date: None }
    }

    pub fn invalid(rejection: Rejection) -> Self {
        Self::Invalid(rejection)
    }

    /// Valid until `expiry_ms`, or expired if that is not strictly after `now_ms`
    pub fn until(expiry_ms: i64, now_ms: i64) -> Self {
        if expiry_ms > now_ms {
            Self::Valid {
                expiry_date: Some(expiry_ms),
            }
        } else {
            Self::Invalid(Rejection::Expired)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid(rejection) => Some(rejection),
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.rejection().map(|r| r.to_string())
    }

    pub fn expiry_date(&self) -> Option<i64> {
        match self {
            Self::Valid { expiry_date } => *expiry_date,
            Self::Invalid(_) => None,
        }
    }
}

/// Wire shape of a validation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl From<&ValidationResult> for ValidationResponse {
    fn from(result: &ValidationResult) -> Self {
        Self {
            is_valid: result.is_valid(),
            reason: result.reason(),
            expiry_date: result.expiry_date(),
        }
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ValidationResponse::from(self).serialize(serializer)
    }
}

//! Entry point for receipt validation.
//!
//! Turns a request body into a typed [`ValidationRequest`], dispatches it to
//! the platform client and fires the post-validation side effects (referral
//! reward, outcome recording) without letting them affect the response.

use crate::{
    error::Result,
    models::receipt::{PlatformPayload, ReceiptValidationBody, ValidationRequest, ValidationResult},
    services::{
        apple_service::AppleService,
        google_service::{AndroidPurchase, GoogleService},
        record_service::{ValidationRecord, ValidationRecorder},
        reward_service::RewardNotifier,
    },
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_SIDE_EFFECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ValidationService {
    apple: AppleService,
    google: GoogleService,
    reward_notifier: Option<Arc<dyn RewardNotifier>>,
    recorder: Option<Arc<dyn ValidationRecorder>>,
    side_effect_timeout: Duration,
}

impl ValidationService {
    pub fn new(apple: AppleService, google: GoogleService) -> Self {
        Self {
            apple,
            google,
            reward_notifier: None,
            recorder: None,
            side_effect_timeout: DEFAULT_SIDE_EFFECT_TIMEOUT,
        }
    }

    pub fn with_reward_notifier(mut self, notifier: Arc<dyn RewardNotifier>) -> Self {
        self.reward_notifier = Some(notifier);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn ValidationRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_side_effect_timeout(mut self, timeout: Duration) -> Self {
        self.side_effect_timeout = timeout;
        self
    }

    /// Validate a raw request body
    ///
    /// Malformed or incomplete bodies fail with `ApiError::BadRequest` before
    /// any platform call is made; every other outcome is a `ValidationResult`.
    pub async fn validate_receipt(&self, body: ReceiptValidationBody) -> Result<ValidationResult> {
        let request = ValidationRequest::try_from(body).map_err(|e| {
            info!("Rejected validation request: {}", e);
            e
        })?;

        Ok(self.validate(&request).await)
    }

    /// Validate a well-formed request against its platform
    #[instrument(skip_all, fields(platform = %request.platform(), product_id = %request.product_id))]
    pub async fn validate(&self, request: &ValidationRequest) -> ValidationResult {
        let result = match &request.payload {
            PlatformPayload::Ios { receipt } => {
                self.apple.validate(receipt, &request.product_id).await
            }
            PlatformPayload::Android {
                package_name,
                purchase_token,
                is_subscription,
            } => {
                self.google
                    .validate(AndroidPurchase {
                        package_name,
                        product_id: &request.product_id,
                        purchase_token,
                        is_subscription: *is_subscription,
                    })
                    .await
            }
        };

        match result.reason() {
            Some(reason) => warn!(reason = %reason, "Receipt validation failed"),
            None => debug!(expiry_date = ?result.expiry_date(), "Receipt validation succeeded"),
        }

        self.record(request, &result);

        if result.is_valid() {
            if let Some(user_id) = &request.user_id {
                self.notify_reward(user_id);
            }
        }

        result
    }

    fn notify_reward(&self, user_id: &str) {
        let Some(notifier) = self.reward_notifier.clone() else {
            return;
        };
        let user_id = user_id.to_string();

        spawn_side_effect("reward hook", self.side_effect_timeout, async move {
            notifier.reward_referrer(&user_id).await
        });
    }

    fn record(&self, request: &ValidationRequest, result: &ValidationResult) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };

        let record = ValidationRecord {
            platform: request.platform(),
            product_id: request.product_id.clone(),
            user_id: request.user_id.clone(),
            receipt_fingerprint: request.fingerprint(),
            is_valid: result.is_valid(),
            reason: result.reason(),
            expiry_date: result.expiry_date(),
        };

        spawn_side_effect("outcome recorder", self.side_effect_timeout, async move {
            recorder.record(record).await
        });
    }
}

/// Run `effect` in the background; failures, timeouts and panics are only logged
fn spawn_side_effect<F>(name: &'static str, bound: Duration, effect: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let task = tokio::spawn(tokio::time::timeout(bound, effect));

    tokio::spawn(async move {
        match task.await {
            Ok(Ok(Ok(()))) => debug!("{} completed", name),
            Ok(Ok(Err(e))) => warn!(error = %e, "{} failed", name),
            Ok(Err(_)) => warn!("{} timed out after {:?}", name, bound),
            Err(e) => error!("{} aborted: {}", name, e),
        }
    });
}

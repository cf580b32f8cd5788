// Service modules
pub mod apple_service;
pub mod google_service;
pub mod record_service;
pub mod reward_service;
pub mod token_service;
pub mod transport;
pub mod validation_service;

pub use apple_service::AppleService;
pub use google_service::GoogleService;
pub use record_service::{DbValidationRecorder, ValidationRecorder};
pub use reward_service::{RewardNotifier, SqlRewardNotifier};
pub use token_service::{ServiceAccountCredential, TokenService};
pub use transport::{HttpTransport, ReqwestTransport};
pub use validation_service::ValidationService;

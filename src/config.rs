use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub iap: IAPConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub reward: RewardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    // Backstop only; must exceed the combined platform budget
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IAPConfig {
    pub apple: AppleConfig,
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppleConfig {
    /// Which verifyReceipt endpoint is queried first: "production" or "sandbox"
    #[serde(default = "default_apple_environment")]
    pub environment: String,
    #[serde(default = "default_apple_production_url")]
    pub production_url: String,
    #[serde(default = "default_apple_sandbox_url")]
    pub sandbox_url: String,
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default = "default_platform_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_google_api_base")]
    pub api_base: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_scope")]
    pub scope: String,
    #[serde(default = "default_platform_timeout_ms")]
    pub timeout_ms: u64,
    /// Raw service-account JSON (takes precedence over the key path)
    #[serde(default)]
    pub service_account_json: Option<String>,
    #[serde(default)]
    pub service_account_key_path: Option<String>,
    #[serde(default)]
    pub cache_access_token: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub record_outcomes: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_reward_function")]
    pub function_name: String,
    #[serde(default = "default_reward_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            function_name: default_reward_function(),
            timeout_ms: default_reward_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_apple_environment() -> String {
    "production".to_string()
}

fn default_apple_production_url() -> String {
    "https://buy.itunes.apple.com/verifyReceipt".to_string()
}

fn default_apple_sandbox_url() -> String {
    "https://sandbox.itunes.apple.com/verifyReceipt".to_string()
}

fn default_platform_timeout_ms() -> u64 {
    8_000
}

fn default_google_api_base() -> String {
    "https://androidpublisher.googleapis.com/androidpublisher/v3".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_google_scope() -> String {
    "https://www.googleapis.com/auth/androidpublisher".to_string()
}

fn default_reward_function() -> String {
    "reward_referrer_for_user".to_string()
}

fn default_reward_timeout_ms() -> u64 {
    5_000
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("IAPCHECK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        // Deployments predating the IAPCHECK prefix export the raw JSON here
        if config.iap.google.service_account_json.is_none()
            && config.iap.google.service_account_key_path.is_none()
        {
            config.iap.google.service_account_json = env::var("GOOGLE_SERVICE_ACCOUNT_JSON")
                .ok()
                .filter(|v| !v.trim().is_empty());
        }

        Ok(config)
    }
}

impl AppleConfig {
    pub fn sandbox_first(&self) -> bool {
        self.environment.eq_ignore_ascii_case("sandbox")
    }
}

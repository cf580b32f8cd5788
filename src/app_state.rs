use crate::{
    config::Config,
    services::{
        AppleService, DbValidationRecorder, GoogleService, HttpTransport, ReqwestTransport,
        ServiceAccountCredential, SqlRewardNotifier, ValidationService,
    },
};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub db: Option<Arc<DatabaseConnection>>,
    pub validation_service: Arc<ValidationService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // One HTTP client for every platform and token call
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);

        let credential = match ServiceAccountCredential::load(&config.iap.google) {
            Ok(Some(credential)) => {
                tracing::info!(
                    client_email = %credential.client_email,
                    "Loaded Google service account"
                );
                Some(credential)
            }
            Ok(None) => {
                tracing::warn!("No Google service account configured; Android validation disabled");
                None
            }
            Err(e) => {
                tracing::error!("Ignoring unusable Google service account: {}", e);
                None
            }
        };

        let needs_db = config.reward.enabled || config.persistence.record_outcomes;
        let db = match (&config.database, needs_db) {
            (Some(database), _) => Some(Arc::new(sea_orm::Database::connect(&database.url).await?)),
            (None, true) => {
                anyhow::bail!("reward hook or outcome recording enabled without a database")
            }
            (None, false) => None,
        };

        let mut validation_service = ValidationService::new(
            AppleService::new(&config.iap.apple, transport.clone()),
            GoogleService::new(&config.iap.google, credential, transport),
        )
        .with_side_effect_timeout(Duration::from_millis(config.reward.timeout_ms));

        if let Some(db) = &db {
            if config.persistence.record_outcomes {
                Migrator::up(db.as_ref(), None).await?;
                validation_service =
                    validation_service.with_recorder(Arc::new(DbValidationRecorder::new(db.clone())));
                tracing::info!("Recording validation outcomes");
            }

            if config.reward.enabled {
                let notifier = SqlRewardNotifier::new(db.clone(), &config.reward)?;
                validation_service = validation_service.with_reward_notifier(Arc::new(notifier));
                tracing::info!(
                    function = %config.reward.function_name,
                    "Referral reward hook enabled"
                );
            }
        }

        Ok(Self::from_parts(config, db, validation_service))
    }

    /// Assemble state from an already-built service
    pub fn from_parts(
        config: Config,
        db: Option<Arc<DatabaseConnection>>,
        validation_service: ValidationService,
    ) -> Self {
        Self {
            db,
            validation_service: Arc::new(validation_service),
            config: Arc::new(config),
        }
    }
}

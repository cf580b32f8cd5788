use crate::{error::Result, models::common::Platform};
use async_trait::async_trait;
use entity::receipt_validations;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

/// One validation outcome as persisted; never contains the raw receipt or token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRecord {
    pub platform: Platform,
    pub product_id: String,
    pub user_id: Option<String>,
    pub receipt_fingerprint: String,
    pub is_valid: bool,
    pub reason: Option<String>,
    pub expiry_date: Option<i64>,
}

#[async_trait]
pub trait ValidationRecorder: Send + Sync {
    async fn record(&self, record: ValidationRecord) -> Result<()>;
}

/// Writes outcomes to the `receipt_validations` table
pub struct DbValidationRecorder {
    db: Arc<DatabaseConnection>,
}

impl DbValidationRecorder {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ValidationRecorder for DbValidationRecorder {
    #[instrument(skip_all, fields(platform = %record.platform, is_valid = record.is_valid))]
    async fn record(&self, record: ValidationRecord) -> Result<()> {
        let id = Uuid::now_v7();

        let row = receipt_validations::ActiveModel {
            id: Set(id),
            platform: Set(record.platform.as_str().to_string()),
            product_id: Set(record.product_id),
            user_id: Set(record.user_id),
            receipt_fingerprint: Set(record.receipt_fingerprint),
            is_valid: Set(record.is_valid),
            reason: Set(record.reason),
            expiry_date: Set(record.expiry_date),
            created_at: Set(OffsetDateTime::now_utc()),
        };

        receipt_validations::Entity::insert(row)
            .exec_without_returning(self.db.as_ref())
            .await?;

        debug!(record_id = %id, "Validation outcome recorded");
        Ok(())
    }
}

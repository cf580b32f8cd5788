use crate::{config::RewardConfig, error::Result};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use std::sync::Arc;
use tracing::{info, instrument};

/// Capability invoked after a successful validation for a known user
#[async_trait]
pub trait RewardNotifier: Send + Sync {
    /// Credit whoever referred `user_id`
    async fn reward_referrer(&self, user_id: &str) -> Result<()>;
}

/// Calls the referral accounting SQL function with the user id
pub struct SqlRewardNotifier {
    db: Arc<DatabaseConnection>,
    function_name: String,
}

impl SqlRewardNotifier {
    pub fn new(db: Arc<DatabaseConnection>, config: &RewardConfig) -> anyhow::Result<Self> {
        if !is_plain_identifier(&config.function_name) {
            anyhow::bail!(
                "reward.function_name {:?} is not a plain SQL identifier",
                config.function_name
            );
        }

        Ok(Self {
            db,
            function_name: config.function_name.clone(),
        })
    }

    fn statement(&self, user_id: &str) -> Statement {
        Statement::from_sql_and_values(
            DbBackend::Postgres,
            format!("SELECT {}($1)", self.function_name),
            [user_id.into()],
        )
    }
}

#[async_trait]
impl RewardNotifier for SqlRewardNotifier {
    #[instrument(skip(self))]
    async fn reward_referrer(&self, user_id: &str) -> Result<()> {
        self.db.execute(self.statement(user_id)).await?;
        info!(function = %self.function_name, "Referral reward recorded");
        Ok(())
    }
}

/// Function names are interpolated into SQL, so only `[a-z_][a-z0-9_]*` is accepted
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() <= 63
}

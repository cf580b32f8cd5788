//! `SeaORM` Entity, generated against the schema in `migration`

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "receipt_validations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub platform: String,
    pub product_id: String,
    pub user_id: Option<String>,
    pub receipt_fingerprint: String,
    pub is_valid: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub expiry_date: Option<i64>,
    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

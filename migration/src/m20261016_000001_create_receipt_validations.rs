use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReceiptValidations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReceiptValidations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // Request context
                    .col(ColumnDef::new(ReceiptValidations::Platform).string().not_null())
                    .col(ColumnDef::new(ReceiptValidations::ProductId).string().not_null())
                    .col(ColumnDef::new(ReceiptValidations::UserId).string().null())
                    // SHA-256 of platform + product + receipt/token; raw receipts are never stored
                    .col(
                        ColumnDef::new(ReceiptValidations::ReceiptFingerprint)
                            .string_len(64)
                            .not_null(),
                    )
                    // Outcome
                    .col(ColumnDef::new(ReceiptValidations::IsValid).boolean().not_null())
                    .col(ColumnDef::new(ReceiptValidations::Reason).text().null())
                    .col(ColumnDef::new(ReceiptValidations::ExpiryDate).big_integer().null())
                    // Timestamps
                    .col(
                        ColumnDef::new(ReceiptValidations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_receipt_validations_fingerprint_created")
                    .table(ReceiptValidations::Table)
                    .col(ReceiptValidations::ReceiptFingerprint)
                    .col(ReceiptValidations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_receipt_validations_user_created")
                    .table(ReceiptValidations::Table)
                    .col(ReceiptValidations::UserId)
                    .col(ReceiptValidations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReceiptValidations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ReceiptValidations {
    Table,
    Id,
    Platform,
    ProductId,
    UserId,
    ReceiptFingerprint,
    IsValid,
    Reason,
    ExpiryDate,
    CreatedAt,
}

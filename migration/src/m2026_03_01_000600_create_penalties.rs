//! Migration to create penalty rules, issued warnings and issued penalties.
//!
//! Warnings and penalties carry an `issued_on` date so per-day deduplication is
//! a plain equality filter on every backend.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesPenaltyRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesPenaltyRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesPenaltyRules::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesPenaltyRules::Code).string().not_null())
                    .col(ColumnDef::new(SalesPenaltyRules::Name).string().not_null())
                    .col(ColumnDef::new(SalesPenaltyRules::Category).string().not_null())
                    .col(
                        ColumnDef::new(SalesPenaltyRules::TriggerEvent)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPenaltyRules::TriggerType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesPenaltyRules::Conditions).json_binary().null())
                    .col(
                        ColumnDef::new(SalesPenaltyRules::PenaltyType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPenaltyRules::PenaltyAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesPenaltyRules::WarningThreshold)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesPenaltyRules::WarningValidityDays)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(ColumnDef::new(SalesPenaltyRules::DailyLimit).integer().null())
                    .col(ColumnDef::new(SalesPenaltyRules::MonthlyLimit).integer().null())
                    .col(
                        ColumnDef::new(SalesPenaltyRules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_penalty_rules_tenant_code")
                    .table(SalesPenaltyRules::Table)
                    .col(SalesPenaltyRules::TenantId)
                    .col(SalesPenaltyRules::Code)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesPenaltyWarnings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesPenaltyWarnings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesPenaltyWarnings::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesPenaltyWarnings::UserId).uuid().not_null())
                    .col(ColumnDef::new(SalesPenaltyWarnings::RuleId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesPenaltyWarnings::RelatedType)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesPenaltyWarnings::RelatedId).uuid().null())
                    .col(ColumnDef::new(SalesPenaltyWarnings::IssuedOn).date().not_null())
                    .col(
                        ColumnDef::new(SalesPenaltyWarnings::WarningNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesPenaltyWarnings::Reason).text().not_null())
                    .col(
                        ColumnDef::new(SalesPenaltyWarnings::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPenaltyWarnings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_penalty_warnings_user_rule")
                    .table(SalesPenaltyWarnings::Table)
                    .col(SalesPenaltyWarnings::TenantId)
                    .col(SalesPenaltyWarnings::UserId)
                    .col(SalesPenaltyWarnings::RuleId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesPenalties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesPenalties::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesPenalties::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesPenalties::UserId).uuid().not_null())
                    .col(ColumnDef::new(SalesPenalties::RuleId).uuid().null())
                    .col(ColumnDef::new(SalesPenalties::RelatedType).string().null())
                    .col(ColumnDef::new(SalesPenalties::RelatedId).uuid().null())
                    .col(ColumnDef::new(SalesPenalties::IssuedOn).date().not_null())
                    .col(ColumnDef::new(SalesPenalties::Reason).text().not_null())
                    .col(
                        ColumnDef::new(SalesPenalties::Amount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(SalesPenalties::Status).string().not_null())
                    .col(
                        ColumnDef::new(SalesPenalties::TriggeredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPenalties::AppealDeadline)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesPenalties::IssuedBy).uuid().null())
                    .col(ColumnDef::new(SalesPenalties::ConfirmedBy).uuid().null())
                    .col(
                        ColumnDef::new(SalesPenalties::ConfirmedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesPenalties::AppealReason).text().null())
                    .col(
                        ColumnDef::new(SalesPenalties::AppealedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesPenalties::ReviewedBy).uuid().null())
                    .col(
                        ColumnDef::new(SalesPenalties::ReviewedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesPenalties::Resolution).text().null())
                    .col(
                        ColumnDef::new(SalesPenalties::DeductedFromBonusId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesPenalties::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_penalties_user_status")
                    .table(SalesPenalties::Table)
                    .col(SalesPenalties::TenantId)
                    .col(SalesPenalties::UserId)
                    .col(SalesPenalties::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesPenalties::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesPenaltyWarnings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesPenaltyRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesPenaltyRules {
    Table,
    Id,
    TenantId,
    Code,
    Name,
    Category,
    TriggerEvent,
    TriggerType,
    Conditions,
    PenaltyType,
    PenaltyAmount,
    WarningThreshold,
    WarningValidityDays,
    DailyLimit,
    MonthlyLimit,
    IsActive,
}

#[derive(DeriveIden)]
enum SalesPenaltyWarnings {
    Table,
    Id,
    TenantId,
    UserId,
    RuleId,
    RelatedType,
    RelatedId,
    IssuedOn,
    WarningNumber,
    Reason,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SalesPenalties {
    Table,
    Id,
    TenantId,
    UserId,
    RuleId,
    RelatedType,
    RelatedId,
    IssuedOn,
    Reason,
    Amount,
    Status,
    TriggeredAt,
    AppealDeadline,
    IssuedBy,
    ConfirmedBy,
    ConfirmedAt,
    AppealReason,
    AppealedAt,
    ReviewedBy,
    ReviewedAt,
    Resolution,
    DeductedFromBonusId,
    UpdatedAt,
}

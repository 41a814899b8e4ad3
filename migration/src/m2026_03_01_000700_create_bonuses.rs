//! Migration to create bonus settings and per-period bonus calculations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesBonusSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesBonusSettings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesBonusSettings::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesBonusSettings::Name).string().not_null())
                    .col(
                        ColumnDef::new(SalesBonusSettings::PeriodType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::CalculationType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::BaseAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::RevenuePercent)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(SalesBonusSettings::Tiers).json_binary().null())
                    .col(
                        ColumnDef::new(SalesBonusSettings::MinKpiScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::MinWorkingDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::ApplicableRoles)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::AutoCalculate)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SalesBonusSettings::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesBonusCalculations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesBonusCalculations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::SettingId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::PeriodStart)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::PeriodEnd)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::KpiScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::Revenue)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::WorkingDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::IsQualified)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::DisqualificationReason)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::BaseAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::TierMultiplier)
                            .double()
                            .not_null()
                            .default(1.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::AppliedTier)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::FinalAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::PenaltyDeductions)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::NetAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::Status)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::Breakdown)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::CalculatedBy)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::CalculatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::ApprovedBy)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::ApprovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::RejectedBy)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::RejectionReason)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesBonusCalculations::PaymentReference)
                            .string()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sales_bonus_calculations-setting_id")
                            .from(
                                SalesBonusCalculations::Table,
                                SalesBonusCalculations::SettingId,
                            )
                            .to(SalesBonusSettings::Table, SalesBonusSettings::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_bonus_calculations_natural_key")
                    .table(SalesBonusCalculations::Table)
                    .col(SalesBonusCalculations::TenantId)
                    .col(SalesBonusCalculations::SettingId)
                    .col(SalesBonusCalculations::UserId)
                    .col(SalesBonusCalculations::PeriodStart)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesBonusCalculations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesBonusSettings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesBonusSettings {
    Table,
    Id,
    TenantId,
    Name,
    PeriodType,
    CalculationType,
    BaseAmount,
    RevenuePercent,
    Tiers,
    MinKpiScore,
    MinWorkingDays,
    ApplicableRoles,
    AutoCalculate,
    IsActive,
}

#[derive(DeriveIden)]
enum SalesBonusCalculations {
    Table,
    Id,
    TenantId,
    SettingId,
    UserId,
    PeriodStart,
    PeriodEnd,
    KpiScore,
    Revenue,
    WorkingDays,
    IsQualified,
    DisqualificationReason,
    BaseAmount,
    TierMultiplier,
    AppliedTier,
    FinalAmount,
    PenaltyDeductions,
    NetAmount,
    Status,
    Breakdown,
    CalculatedBy,
    CalculatedAt,
    ApprovedBy,
    ApprovedAt,
    RejectedBy,
    RejectionReason,
    PaidAt,
    PaymentReference,
}

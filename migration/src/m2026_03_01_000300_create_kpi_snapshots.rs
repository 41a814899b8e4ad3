//! Migration to create daily KPI snapshots and period summaries.
//!
//! Both tables carry a natural-key unique index so batch recomputation can
//! upsert in place.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesKpiDailySnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesKpiDailySnapshots::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::MetricId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::MetricType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::SnapshotDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::ActualValue)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::TargetValue)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::AchievementPercent)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiDailySnapshots::UpdatedAt)
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
                    .name("idx_sales_kpi_daily_snapshots_natural_key")
                    .table(SalesKpiDailySnapshots::Table)
                    .col(SalesKpiDailySnapshots::TenantId)
                    .col(SalesKpiDailySnapshots::UserId)
                    .col(SalesKpiDailySnapshots::MetricId)
                    .col(SalesKpiDailySnapshots::SnapshotDate)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesKpiPeriodSummaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::PeriodType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::PeriodStart)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::PeriodEnd)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::MetricScores)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::TotalWeight)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::OverallScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::PerformanceTier)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::WorkingDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SalesKpiPeriodSummaries::Rank).integer().null())
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::PreviousRank)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::RankChange)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesKpiPeriodSummaries::CalculatedAt)
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
                    .name("idx_sales_kpi_period_summaries_natural_key")
                    .table(SalesKpiPeriodSummaries::Table)
                    .col(SalesKpiPeriodSummaries::TenantId)
                    .col(SalesKpiPeriodSummaries::UserId)
                    .col(SalesKpiPeriodSummaries::PeriodType)
                    .col(SalesKpiPeriodSummaries::PeriodStart)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesKpiPeriodSummaries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesKpiDailySnapshots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesKpiDailySnapshots {
    Table,
    Id,
    TenantId,
    UserId,
    MetricId,
    MetricType,
    SnapshotDate,
    ActualValue,
    TargetValue,
    AchievementPercent,
    Score,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesKpiPeriodSummaries {
    Table,
    Id,
    TenantId,
    UserId,
    PeriodType,
    PeriodStart,
    PeriodEnd,
    MetricScores,
    TotalWeight,
    OverallScore,
    PerformanceTier,
    WorkingDays,
    Rank,
    PreviousRank,
    RankChange,
    CalculatedAt,
}

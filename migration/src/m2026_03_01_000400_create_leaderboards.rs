//! Migration to create leaderboard entries and all-time records.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesLeaderboardEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::PeriodType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::PeriodStart)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::PeriodEnd)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::TotalScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::WeightedScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::MetricValues)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::Rank)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::PreviousRank)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::RankChange)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SalesLeaderboardEntries::Medal).string().null())
                    .col(
                        ColumnDef::new(SalesLeaderboardEntries::UpdatedAt)
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
                    .name("idx_sales_leaderboard_entries_natural_key")
                    .table(SalesLeaderboardEntries::Table)
                    .col(SalesLeaderboardEntries::TenantId)
                    .col(SalesLeaderboardEntries::UserId)
                    .col(SalesLeaderboardEntries::PeriodType)
                    .col(SalesLeaderboardEntries::PeriodStart)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesLeaderboardRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::RecordType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::Value)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::PeriodType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::PeriodStart)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::PreviousUserId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::PreviousValue)
                            .double()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesLeaderboardRecords::AchievedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_leaderboard_records_tenant_type")
                    .table(SalesLeaderboardRecords::Table)
                    .col(SalesLeaderboardRecords::TenantId)
                    .col(SalesLeaderboardRecords::RecordType)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesLeaderboardRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesLeaderboardEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesLeaderboardEntries {
    Table,
    Id,
    TenantId,
    UserId,
    PeriodType,
    PeriodStart,
    PeriodEnd,
    TotalScore,
    WeightedScore,
    MetricValues,
    Rank,
    PreviousRank,
    RankChange,
    Medal,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesLeaderboardRecords {
    Table,
    Id,
    TenantId,
    RecordType,
    UserId,
    Value,
    PeriodType,
    PeriodStart,
    PreviousUserId,
    PreviousValue,
    AchievedAt,
}

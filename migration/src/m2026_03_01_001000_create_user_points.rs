//! Migration to create the points ledger: one balance row per user and an
//! append-only credit log keyed by where the points came from.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesUserPoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesUserPoints::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesUserPoints::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesUserPoints::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesUserPoints::TotalPoints)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesUserPoints::Level)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(SalesUserPoints::AchievementsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesUserPoints::GoldMedals)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesUserPoints::SilverMedals)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesUserPoints::BronzeMedals)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SalesUserPoints::BestRank).integer().null())
                    .col(
                        ColumnDef::new(SalesUserPoints::UpdatedAt)
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
                    .name("idx_sales_user_points_tenant_user")
                    .table(SalesUserPoints::Table)
                    .col(SalesUserPoints::TenantId)
                    .col(SalesUserPoints::UserId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesPointsTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesPointsTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::Source)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::SourceKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::Points)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::Description)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesPointsTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_points_transactions_source")
                    .table(SalesPointsTransactions::Table)
                    .col(SalesPointsTransactions::TenantId)
                    .col(SalesPointsTransactions::UserId)
                    .col(SalesPointsTransactions::Source)
                    .col(SalesPointsTransactions::SourceKey)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(SalesPointsTransactions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(SalesUserPoints::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesUserPoints {
    Table,
    Id,
    TenantId,
    UserId,
    TotalPoints,
    Level,
    AchievementsCount,
    GoldMedals,
    SilverMedals,
    BronzeMedals,
    BestRank,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesPointsTransactions {
    Table,
    Id,
    TenantId,
    UserId,
    Source,
    SourceKey,
    Points,
    BalanceAfter,
    Description,
    CreatedAt,
}

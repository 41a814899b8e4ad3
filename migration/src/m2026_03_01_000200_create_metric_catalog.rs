//! Migration to create the per-tenant metric catalog and user target overrides.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesMetricDefinitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::MetricType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesMetricDefinitions::Name).string().not_null())
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::Category)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::Weight)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::TargetMin)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesMetricDefinitions::TargetGood).double().null())
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::TargetExcellent)
                            .double()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesMetricDefinitions::Unit).string().not_null())
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::CalculationMethod)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::PeriodType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SalesMetricDefinitions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sales_metric_definitions-tenant_id")
                            .from(
                                SalesMetricDefinitions::Table,
                                SalesMetricDefinitions::TenantId,
                            )
                            .to(Tenants::Table, Tenants::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_metric_definitions_tenant_type")
                    .table(SalesMetricDefinitions::Table)
                    .col(SalesMetricDefinitions::TenantId)
                    .col(SalesMetricDefinitions::MetricType)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesUserTargets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesUserTargets::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesUserTargets::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesUserTargets::UserId).uuid().not_null())
                    .col(ColumnDef::new(SalesUserTargets::MetricId).uuid().not_null())
                    .col(ColumnDef::new(SalesUserTargets::PeriodType).string().not_null())
                    .col(ColumnDef::new(SalesUserTargets::PeriodStart).date().not_null())
                    .col(ColumnDef::new(SalesUserTargets::TargetValue).double().not_null())
                    .col(
                        ColumnDef::new(SalesUserTargets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sales_user_targets-metric_id")
                            .from(SalesUserTargets::Table, SalesUserTargets::MetricId)
                            .to(SalesMetricDefinitions::Table, SalesMetricDefinitions::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_user_targets_unique_period")
                    .table(SalesUserTargets::Table)
                    .col(SalesUserTargets::TenantId)
                    .col(SalesUserTargets::UserId)
                    .col(SalesUserTargets::MetricId)
                    .col(SalesUserTargets::PeriodType)
                    .col(SalesUserTargets::PeriodStart)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesUserTargets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesMetricDefinitions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesMetricDefinitions {
    Table,
    Id,
    TenantId,
    MetricType,
    Name,
    Category,
    Weight,
    TargetMin,
    TargetGood,
    TargetExcellent,
    Unit,
    CalculationMethod,
    PeriodType,
    IsActive,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesUserTargets {
    Table,
    Id,
    TenantId,
    UserId,
    MetricId,
    PeriodType,
    PeriodStart,
    TargetValue,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

//! Migration to create the sales alert outbox.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesAlerts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SalesAlerts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SalesAlerts::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesAlerts::UserId).uuid().null())
                    .col(ColumnDef::new(SalesAlerts::AlertType).string().not_null())
                    .col(ColumnDef::new(SalesAlerts::Priority).string().not_null())
                    .col(ColumnDef::new(SalesAlerts::Title).string().not_null())
                    .col(ColumnDef::new(SalesAlerts::Message).text().not_null())
                    .col(ColumnDef::new(SalesAlerts::Data).json_binary().not_null())
                    .col(ColumnDef::new(SalesAlerts::Channels).json_binary().not_null())
                    .col(ColumnDef::new(SalesAlerts::SubjectId).uuid().null())
                    .col(
                        ColumnDef::new(SalesAlerts::Status)
                            .string()
                            .not_null()
                            .default("unread"),
                    )
                    .col(
                        ColumnDef::new(SalesAlerts::ScheduledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesAlerts::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesAlerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_alerts_tenant_user")
                    .table(SalesAlerts::Table)
                    .col(SalesAlerts::TenantId)
                    .col(SalesAlerts::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_alerts_type_subject")
                    .table(SalesAlerts::Table)
                    .col(SalesAlerts::TenantId)
                    .col(SalesAlerts::AlertType)
                    .col(SalesAlerts::SubjectId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesAlerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SalesAlerts {
    Table,
    Id,
    TenantId,
    UserId,
    AlertType,
    Priority,
    Title,
    Message,
    Data,
    Channels,
    SubjectId,
    Status,
    ScheduledAt,
    ExpiresAt,
    CreatedAt,
}

//! Migration to create the CRM fact tables.
//!
//! These tables are written by the CRM; the engine only reads them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CrmPipelineStages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrmPipelineStages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrmPipelineStages::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CrmPipelineStages::Slug).string().not_null())
                    .col(ColumnDef::new(CrmPipelineStages::Name).string().not_null())
                    .col(
                        ColumnDef::new(CrmPipelineStages::IsWon)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CrmPipelineStages::IsLost)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CrmPipelineStages::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesTeamMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesTeamMembers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesTeamMembers::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesTeamMembers::UserId).uuid().not_null())
                    .col(ColumnDef::new(SalesTeamMembers::DisplayName).string().null())
                    .col(ColumnDef::new(SalesTeamMembers::Role).string().not_null())
                    .col(
                        ColumnDef::new(SalesTeamMembers::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SalesTeamMembers::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_team_members_tenant_user")
                    .table(SalesTeamMembers::Table)
                    .col(SalesTeamMembers::TenantId)
                    .col(SalesTeamMembers::UserId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CrmLeads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CrmLeads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CrmLeads::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CrmLeads::AssignedTo).uuid().null())
                    .col(ColumnDef::new(CrmLeads::Name).string().null())
                    .col(ColumnDef::new(CrmLeads::Phone).string().null())
                    .col(ColumnDef::new(CrmLeads::Email).string().null())
                    .col(ColumnDef::new(CrmLeads::Company).string().null())
                    .col(ColumnDef::new(CrmLeads::Region).string().null())
                    .col(ColumnDef::new(CrmLeads::Source).string().null())
                    .col(ColumnDef::new(CrmLeads::Status).string().not_null())
                    .col(
                        ColumnDef::new(CrmLeads::EstimatedValue)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(CrmLeads::LostReason).text().null())
                    .col(
                        ColumnDef::new(CrmLeads::ActivitiesCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrmLeads::FirstResponseAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CrmLeads::LastContactedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CrmLeads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CrmLeads::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crm_leads_tenant_assignee")
                    .table(CrmLeads::Table)
                    .col(CrmLeads::TenantId)
                    .col(CrmLeads::AssignedTo)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CrmCalls::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CrmCalls::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CrmCalls::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CrmCalls::UserId).uuid().not_null())
                    .col(ColumnDef::new(CrmCalls::LeadId).uuid().null())
                    .col(ColumnDef::new(CrmCalls::Status).string().not_null())
                    .col(
                        ColumnDef::new(CrmCalls::DurationSeconds)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrmCalls::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crm_calls_tenant_user_started")
                    .table(CrmCalls::Table)
                    .col(CrmCalls::TenantId)
                    .col(CrmCalls::UserId)
                    .col(CrmCalls::StartedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CrmTasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CrmTasks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CrmTasks::TenantId).uuid().not_null())
                    .col(ColumnDef::new(CrmTasks::AssignedTo).uuid().null())
                    .col(ColumnDef::new(CrmTasks::LeadId).uuid().null())
                    .col(ColumnDef::new(CrmTasks::Kind).string().not_null())
                    .col(ColumnDef::new(CrmTasks::Status).string().not_null())
                    .col(
                        ColumnDef::new(CrmTasks::DueAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CrmTasks::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CrmTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crm_tasks_tenant_assignee")
                    .table(CrmTasks::Table)
                    .col(CrmTasks::TenantId)
                    .col(CrmTasks::AssignedTo)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrmTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CrmCalls::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CrmLeads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesTeamMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CrmPipelineStages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CrmPipelineStages {
    Table,
    Id,
    TenantId,
    Slug,
    Name,
    IsWon,
    IsLost,
    SortOrder,
}

#[derive(DeriveIden)]
enum SalesTeamMembers {
    Table,
    Id,
    TenantId,
    UserId,
    DisplayName,
    Role,
    IsActive,
    JoinedAt,
}

#[derive(DeriveIden)]
enum CrmLeads {
    Table,
    Id,
    TenantId,
    AssignedTo,
    Name,
    Phone,
    Email,
    Company,
    Region,
    Source,
    Status,
    EstimatedValue,
    LostReason,
    ActivitiesCount,
    FirstResponseAt,
    LastContactedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CrmCalls {
    Table,
    Id,
    TenantId,
    UserId,
    LeadId,
    Status,
    DurationSeconds,
    StartedAt,
}

#[derive(DeriveIden)]
enum CrmTasks {
    Table,
    Id,
    TenantId,
    AssignedTo,
    LeadId,
    Kind,
    Status,
    DueAt,
    CompletedAt,
    CreatedAt,
}

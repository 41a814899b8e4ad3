//! Migration to create lead scoring rules, current lead scores and score history.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LeadScoringRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeadScoringRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeadScoringRules::TenantId).uuid().not_null())
                    .col(ColumnDef::new(LeadScoringRules::Name).string().not_null())
                    .col(ColumnDef::new(LeadScoringRules::Category).string().not_null())
                    .col(ColumnDef::new(LeadScoringRules::Field).string().not_null())
                    .col(ColumnDef::new(LeadScoringRules::Operator).string().not_null())
                    .col(ColumnDef::new(LeadScoringRules::Value).string().null())
                    .col(ColumnDef::new(LeadScoringRules::Points).integer().not_null())
                    .col(
                        ColumnDef::new(LeadScoringRules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(LeadScoringRules::SortOrder)
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
                    .table(LeadScores::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LeadScores::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(LeadScores::TenantId).uuid().not_null())
                    .col(ColumnDef::new(LeadScores::LeadId).uuid().not_null())
                    .col(ColumnDef::new(LeadScores::Score).integer().not_null())
                    .col(ColumnDef::new(LeadScores::Category).string().not_null())
                    .col(ColumnDef::new(LeadScores::Breakdown).json_binary().not_null())
                    .col(
                        ColumnDef::new(LeadScores::ScoredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_lead_scores_tenant_lead")
                    .table(LeadScores::Table)
                    .col(LeadScores::TenantId)
                    .col(LeadScores::LeadId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeadScoreHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeadScoreHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeadScoreHistory::TenantId).uuid().not_null())
                    .col(ColumnDef::new(LeadScoreHistory::LeadId).uuid().not_null())
                    .col(ColumnDef::new(LeadScoreHistory::OldScore).integer().not_null())
                    .col(ColumnDef::new(LeadScoreHistory::NewScore).integer().not_null())
                    .col(
                        ColumnDef::new(LeadScoreHistory::OldCategory)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeadScoreHistory::NewCategory)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LeadScoreHistory::Reason).string().not_null())
                    .col(
                        ColumnDef::new(LeadScoreHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeadScoreHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LeadScores::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LeadScoringRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LeadScoringRules {
    Table,
    Id,
    TenantId,
    Name,
    Category,
    Field,
    Operator,
    Value,
    Points,
    IsActive,
    SortOrder,
}

#[derive(DeriveIden)]
enum LeadScores {
    Table,
    Id,
    TenantId,
    LeadId,
    Score,
    Category,
    Breakdown,
    ScoredAt,
}

#[derive(DeriveIden)]
enum LeadScoreHistory {
    Table,
    Id,
    TenantId,
    LeadId,
    OldScore,
    NewScore,
    OldCategory,
    NewCategory,
    Reason,
    CreatedAt,
}

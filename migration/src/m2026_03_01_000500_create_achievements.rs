//! Migration to create achievement definitions, awarded achievements and streaks.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesAchievementDefinitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Code)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Name)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Description)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Category)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Metric)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::TriggerType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::TargetValue)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Conditions)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::IsRepeatable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Tier)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::Points)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesAchievementDefinitions::IsActive)
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
                    .name("idx_sales_achievement_definitions_tenant_code")
                    .table(SalesAchievementDefinitions::Table)
                    .col(SalesAchievementDefinitions::TenantId)
                    .col(SalesAchievementDefinitions::Code)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesUserAchievements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesUserAchievements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesUserAchievements::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesUserAchievements::AchievementId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::Progress)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::TimesEarned)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::EarnedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::IsSeen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::IsPinned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SalesUserAchievements::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sales_user_achievements-achievement_id")
                            .from(
                                SalesUserAchievements::Table,
                                SalesUserAchievements::AchievementId,
                            )
                            .to(
                                SalesAchievementDefinitions::Table,
                                SalesAchievementDefinitions::Id,
                            )
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_user_achievements_unique_award")
                    .table(SalesUserAchievements::Table)
                    .col(SalesUserAchievements::TenantId)
                    .col(SalesUserAchievements::UserId)
                    .col(SalesUserAchievements::AchievementId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesUserStreaks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesUserStreaks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SalesUserStreaks::TenantId).uuid().not_null())
                    .col(ColumnDef::new(SalesUserStreaks::UserId).uuid().not_null())
                    .col(ColumnDef::new(SalesUserStreaks::StreakType).string().not_null())
                    .col(
                        ColumnDef::new(SalesUserStreaks::CurrentStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesUserStreaks::BestStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesUserStreaks::LastQualifyingDate)
                            .date()
                            .null(),
                    )
                    .col(ColumnDef::new(SalesUserStreaks::StartedOn).date().null())
                    .col(
                        ColumnDef::new(SalesUserStreaks::UpdatedAt)
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
                    .name("idx_sales_user_streaks_natural_key")
                    .table(SalesUserStreaks::Table)
                    .col(SalesUserStreaks::TenantId)
                    .col(SalesUserStreaks::UserId)
                    .col(SalesUserStreaks::StreakType)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SalesUserStreaks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesUserAchievements::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(SalesAchievementDefinitions::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum SalesAchievementDefinitions {
    Table,
    Id,
    TenantId,
    Code,
    Name,
    Description,
    Category,
    Metric,
    TriggerType,
    TargetValue,
    Conditions,
    IsRepeatable,
    Tier,
    Points,
    IsActive,
}

#[derive(DeriveIden)]
enum SalesUserAchievements {
    Table,
    Id,
    TenantId,
    UserId,
    AchievementId,
    Progress,
    TimesEarned,
    EarnedAt,
    IsSeen,
    IsPinned,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesUserStreaks {
    Table,
    Id,
    TenantId,
    UserId,
    StreakType,
    CurrentStreak,
    BestStreak,
    LastQualifyingDate,
    StartedOn,
    UpdatedAt,
}

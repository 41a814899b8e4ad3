//! Achievement awarded to a user.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_user_achievements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    /// Measured value when last earned
    pub progress: f64,
    pub times_earned: i32,
    pub earned_at: DateTimeUtc,
    pub is_seen: bool,
    pub is_pinned: bool,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::achievement_definition::Entity",
        from = "Column::AchievementId",
        to = "super::achievement_definition::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    AchievementDefinition,
}

impl Related<super::achievement_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AchievementDefinition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

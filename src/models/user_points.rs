//! Points balance, level and medal tally per user.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_user_points")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// Every point ever credited; doubles as experience for levels
    pub total_points: i64,
    pub level: i32,
    pub achievements_count: i32,
    pub gold_medals: i32,
    pub silver_medals: i32,
    pub bronze_medals: i32,
    /// Best podium place on a closed weekly or monthly board
    pub best_rank: Option<i32>,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn total_medals(&self) -> i32 {
        self.gold_medals + self.silver_medals + self.bronze_medals
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

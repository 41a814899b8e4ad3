//! Field rule contributing points to a lead's temperature score.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lead_scoring_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Grouping shown in the score breakdown, e.g. `completeness` or `negative`
    pub category: String,
    /// Lead attribute the rule reads (`phone`, `estimated_value`, ...)
    pub field: String,
    /// Comparison operator, see [`crate::lead_scoring::rules::Operator`]
    pub operator: String,
    pub value: Option<String>,
    /// Signed points added when the rule matches
    pub points: i32,
    pub is_active: bool,
    pub sort_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

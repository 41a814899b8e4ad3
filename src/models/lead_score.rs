//! # Lead Score Model
//!
//! Current temperature of a lead. One row per lead; history lives in
//! [`super::lead_score_history`].

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lead_scores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub score: i32,
    pub category: LeadTemperature,
    /// Matched rules with their points
    #[sea_orm(column_type = "JsonBinary")]
    pub breakdown: Json,
    pub scored_at: DateTimeUtc,
}

/// Discrete temperature band of a 0-100 lead score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum LeadTemperature {
    #[sea_orm(string_value = "hot")]
    Hot,
    #[sea_orm(string_value = "warm")]
    Warm,
    #[sea_orm(string_value = "cool")]
    Cool,
    #[sea_orm(string_value = "cold")]
    Cold,
    #[sea_orm(string_value = "frozen")]
    Frozen,
}

impl LeadTemperature {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => LeadTemperature::Hot,
            s if s >= 60 => LeadTemperature::Warm,
            s if s >= 40 => LeadTemperature::Cool,
            s if s >= 20 => LeadTemperature::Cold,
            _ => LeadTemperature::Frozen,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_bands() {
        assert_eq!(LeadTemperature::from_score(100), LeadTemperature::Hot);
        assert_eq!(LeadTemperature::from_score(80), LeadTemperature::Hot);
        assert_eq!(LeadTemperature::from_score(79), LeadTemperature::Warm);
        assert_eq!(LeadTemperature::from_score(60), LeadTemperature::Warm);
        assert_eq!(LeadTemperature::from_score(59), LeadTemperature::Cool);
        assert_eq!(LeadTemperature::from_score(39), LeadTemperature::Cold);
        assert_eq!(LeadTemperature::from_score(20), LeadTemperature::Cold);
        assert_eq!(LeadTemperature::from_score(19), LeadTemperature::Frozen);
        assert_eq!(LeadTemperature::from_score(0), LeadTemperature::Frozen);
    }
}

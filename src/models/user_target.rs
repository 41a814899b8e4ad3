//! Per-user override of a metric's target for one period.

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

use crate::period::PeriodType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sales_user_targets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub metric_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub target_value: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::metric_definition::Entity",
        from = "Column::MetricId",
        to = "super::metric_definition::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    MetricDefinition,
}

impl Related<super::metric_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetricDefinition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

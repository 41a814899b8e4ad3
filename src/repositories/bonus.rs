//! # Bonus Repository
//!
//! Bonus schemes and their per-period calculations.

use crate::error::RepositoryError;
use crate::models::bonus_calculation::{
    self, BonusStatus, Entity as BonusCalculation, Model as CalculationModel,
};
use crate::models::bonus_setting::{self, Entity as BonusSetting, Model as SettingModel};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

pub struct BonusRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> BonusRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    pub async fn active_settings(&self) -> Result<Vec<SettingModel>, RepositoryError> {
        BonusSetting::find()
            .filter(bonus_setting::Column::TenantId.eq(self.tenant_id))
            .filter(bonus_setting::Column::IsActive.eq(true))
            .order_by_asc(bonus_setting::Column::Name)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_setting(
        &self,
        setting_id: Uuid,
    ) -> Result<Option<SettingModel>, RepositoryError> {
        BonusSetting::find_by_id(setting_id)
            .filter(bonus_setting::Column::TenantId.eq(self.tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_setting_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SettingModel>, RepositoryError> {
        BonusSetting::find()
            .filter(bonus_setting::Column::TenantId.eq(self.tenant_id))
            .filter(bonus_setting::Column::Name.eq(name))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a scheme unless one with the same name exists.
    pub async fn create_setting(
        &self,
        mut setting: bonus_setting::ActiveModel,
        name: &str,
    ) -> Result<SettingModel, RepositoryError> {
        if let Some(existing) = self.find_setting_by_name(name).await? {
            return Ok(existing);
        }
        setting.id = Set(Uuid::new_v4());
        setting.tenant_id = Set(self.tenant_id);
        setting.name = Set(name.to_string());
        setting
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// The calculation for one scheme, user and period, if any.
    pub async fn find_calculation(
        &self,
        setting_id: Uuid,
        user_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Option<CalculationModel>, RepositoryError> {
        BonusCalculation::find()
            .filter(bonus_calculation::Column::TenantId.eq(self.tenant_id))
            .filter(bonus_calculation::Column::SettingId.eq(setting_id))
            .filter(bonus_calculation::Column::UserId.eq(user_id))
            .filter(bonus_calculation::Column::PeriodStart.eq(period_start))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_calculation_by_id(
        &self,
        calculation_id: Uuid,
    ) -> Result<Option<CalculationModel>, RepositoryError> {
        BonusCalculation::find_by_id(calculation_id)
            .filter(bonus_calculation::Column::TenantId.eq(self.tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a new calculation or overwrite `existing` in place.
    pub async fn save_calculation(
        &self,
        mut calculation: bonus_calculation::ActiveModel,
        existing: Option<&CalculationModel>,
    ) -> Result<CalculationModel, RepositoryError> {
        calculation.tenant_id = Set(self.tenant_id);
        match existing {
            Some(existing) => {
                calculation.id = Set(existing.id);
                calculation
                    .update(self.db)
                    .await
                    .map_err(RepositoryError::database_error)
            }
            None => {
                calculation.id = Set(Uuid::new_v4());
                calculation
                    .insert(self.db)
                    .await
                    .map_err(RepositoryError::database_error)
            }
        }
    }

    pub async fn update_calculation(
        &self,
        calculation: bonus_calculation::ActiveModel,
    ) -> Result<CalculationModel, RepositoryError> {
        calculation
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn calculations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CalculationModel>, RepositoryError> {
        BonusCalculation::find()
            .filter(bonus_calculation::Column::TenantId.eq(self.tenant_id))
            .filter(bonus_calculation::Column::UserId.eq(user_id))
            .order_by_desc(bonus_calculation::Column::PeriodStart)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Calculations in one status, newest period first.
    pub async fn with_status(
        &self,
        status: BonusStatus,
    ) -> Result<Vec<CalculationModel>, RepositoryError> {
        BonusCalculation::find()
            .filter(bonus_calculation::Column::TenantId.eq(self.tenant_id))
            .filter(bonus_calculation::Column::Status.eq(status))
            .order_by_desc(bonus_calculation::Column::PeriodStart)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

//! Database migrations for the performance engine.
//!
//! Schema for the tenant registry, the read-only CRM fact tables the engine
//! aggregates over, and every table the engine itself materialises.

pub use sea_orm_migration::prelude::*;

mod m2026_03_01_000001_create_tenants;
mod m2026_03_01_000100_create_crm_facts;
mod m2026_03_01_000200_create_metric_catalog;
mod m2026_03_01_000300_create_kpi_snapshots;
mod m2026_03_01_000400_create_leaderboards;
mod m2026_03_01_000500_create_achievements;
mod m2026_03_01_000600_create_penalties;
mod m2026_03_01_000700_create_bonuses;
mod m2026_03_01_000800_create_lead_scoring;
mod m2026_03_01_000900_create_sales_alerts;
mod m2026_03_01_001000_create_user_points;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_03_01_000001_create_tenants::Migration),
            Box::new(m2026_03_01_000100_create_crm_facts::Migration),
            Box::new(m2026_03_01_000200_create_metric_catalog::Migration),
            Box::new(m2026_03_01_000300_create_kpi_snapshots::Migration),
            Box::new(m2026_03_01_000400_create_leaderboards::Migration),
            Box::new(m2026_03_01_000500_create_achievements::Migration),
            Box::new(m2026_03_01_000600_create_penalties::Migration),
            Box::new(m2026_03_01_000700_create_bonuses::Migration),
            Box::new(m2026_03_01_000800_create_lead_scoring::Migration),
            Box::new(m2026_03_01_000900_create_sales_alerts::Migration),
            Box::new(m2026_03_01_001000_create_user_points::Migration),
        ]
    }
}

//! 铸造 ERP 数据库迁移目录
//!
//! 每个迁移一个模块，版本号连续递增。已发布的迁移只追加、不修改，
//! 否则台账中的校验和会与目录不一致

use nobal_errors::AppResult;
use nobal_migration_core::Catalog;

mod columns;
mod m0001_inventory_base;
mod m0002_manufacturing_base;
mod m0003_selling_base;
mod m0004_bom_tables;
mod m0005_bom_header_fields;
mod m0006_job_card;
mod m0007_work_order_planning_dates;
mod m0008_job_card_subcontracting;
mod m0009_operation_type;
mod m0010_hourly_rates;
mod m0011_workstation_analysis;
mod m0012_execution_log_timing;
mod m0013_production_plan_links;
mod m0014_grn_request_fields;
mod m0015_stock_item_code;
mod m0016_stock_ledger_transaction_types;
mod m0017_sales_order_bom_details;
mod m0018_sales_order_status_v2;
mod m0019_sales_order_customer_fk;

/// 完整的迁移目录
pub fn catalog() -> AppResult<Catalog> {
    Catalog::new(vec![
        m0001_inventory_base::migration(),
        m0002_manufacturing_base::migration(),
        m0003_selling_base::migration(),
        m0004_bom_tables::migration(),
        m0005_bom_header_fields::migration(),
        m0006_job_card::migration(),
        m0007_work_order_planning_dates::migration(),
        m0008_job_card_subcontracting::migration(),
        m0009_operation_type::migration(),
        m0010_hourly_rates::migration(),
        m0011_workstation_analysis::migration(),
        m0012_execution_log_timing::migration(),
        m0013_production_plan_links::migration(),
        m0014_grn_request_fields::migration(),
        m0015_stock_item_code::migration(),
        m0016_stock_ledger_transaction_types::migration(),
        m0017_sales_order_bom_details::migration(),
        m0018_sales_order_status_v2::migration(),
        m0019_sales_order_customer_fk::migration(),
    ])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use nobal_migration_core::testing::FakeDatabase;
    use nobal_migration_core::{Migrator, PlannedAction, StepOutcome};

    use super::*;

    fn migrator(db: &Arc<FakeDatabase>) -> Migrator {
        Migrator::new(db.clone(), db.clone(), db.clone(), db.clone())
    }

    #[test]
    fn test_catalog_is_contiguous() {
        let catalog = catalog().unwrap();
        let versions: Vec<i64> = catalog.migrations().iter().map(|m| m.version).collect();
        let expected: Vec<i64> = (1..=catalog.len() as i64).collect();
        assert_eq!(versions, expected);
    }

    #[test]
    fn test_checksums_are_distinct() {
        let catalog = catalog().unwrap();
        let checksums: BTreeSet<String> =
            catalog.migrations().iter().map(|m| m.checksum()).collect();
        assert_eq!(checksums.len(), catalog.len());
        assert!(checksums.iter().all(|c| c.len() == 64));
    }

    #[tokio::test]
    async fn test_fresh_database_end_to_end() {
        let db = Arc::new(FakeDatabase::new());
        let catalog = catalog().unwrap();

        let report = migrator(&db).migrate(&catalog, None).await.unwrap();

        assert!(report.is_success(), "{:?}", report.failure);
        assert_eq!(report.applied_count(), catalog.len());
        assert!(report.applied.iter().all(|m| m.degraded_steps() == 0));
        assert_eq!(db.ledger_rows().len(), catalog.len());

        let job_card = db.table("job_card").unwrap();
        let names: Vec<&str> = job_card.columns.iter().map(|c| c.name.as_str()).collect();
        let operation_time = names.iter().position(|n| *n == "operation_time").unwrap();
        assert_eq!(names[operation_time + 1], "hourly_rate");

        let order = db.table("selling_sales_order").unwrap();
        assert_eq!(
            order.foreign_keys.get("selling_sales_order_ibfk_1").map(String::as_str),
            Some("customer")
        );
        assert!(!order.column("status").unwrap().column_type.contains("confirmed"));

        let ledger = db.table("stock_ledger").unwrap();
        assert!(!ledger.column("item_code").unwrap().nullable);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let db = Arc::new(FakeDatabase::new());
        let catalog = catalog().unwrap();
        migrator(&db).migrate(&catalog, None).await.unwrap();
        let snapshot = db.snapshot();
        let statements = db.statements().len();

        let report = migrator(&db).migrate(&catalog, None).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.applied_count(), 0);
        assert_eq!(report.skipped.len(), catalog.len());
        assert_eq!(db.snapshot(), snapshot);
        assert_eq!(db.statements().len(), statements);
    }

    #[tokio::test]
    async fn test_reapply_without_ledger_converges() {
        let db = Arc::new(FakeDatabase::new());
        let catalog = catalog().unwrap();
        migrator(&db).migrate(&catalog, None).await.unwrap();
        let snapshot = db.snapshot();

        db.forget_ledger();
        let report = migrator(&db).migrate(&catalog, None).await.unwrap();

        assert!(report.is_success(), "{:?}", report.failure);
        assert_eq!(report.applied_count(), catalog.len());
        assert_eq!(db.snapshot(), snapshot);

        // 除了数据更新和状态改版，其余步骤都已存在
        let inventory = &report.applied[0];
        assert!(inventory
            .steps
            .iter()
            .all(|s| s.outcome == StepOutcome::AlreadyPresent));
    }

    #[tokio::test]
    async fn test_plan_on_empty_database() {
        let db = Arc::new(FakeDatabase::new());
        let catalog = catalog().unwrap();

        let plan = migrator(&db).plan(&catalog, None).await.unwrap();

        assert_eq!(plan.len(), catalog.len());
        assert!(plan.iter().all(|m| !m.will_fail()));
        assert!(plan
            .iter()
            .flat_map(|m| &m.steps)
            .all(|s| s.action == PlannedAction::WillApply));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_grn_link_degrades_without_material_request() {
        let db = Arc::new(FakeDatabase::new().with_table("grn_requests", &[("id", "int")]));
        let catalog = Catalog::new(vec![m0014_grn_request_fields::migration()]).unwrap();

        let report = migrator(&db).migrate(&catalog, None).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.applied[0].degraded_steps(), 1);
        let grn = db.table("grn_requests").unwrap();
        assert!(grn.column("material_request_id").is_some());
        assert!(grn.foreign_keys.is_empty());
    }
}

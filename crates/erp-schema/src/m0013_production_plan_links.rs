//! 生产计划关联销售订单、BOM 与领料申请

use nobal_migration_core::{ColumnDef, IndexDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    Migration::new(13, "production_plan_links")
        .description("Sales order, BOM and material request links on production plans")
        .step(Step::add_column(
            "production_plan",
            ColumnDef::new("sales_order_id", "VARCHAR(100)"),
        ))
        .step(Step::create_index(
            "production_plan",
            IndexDef::new("idx_sales_order_id", &["sales_order_id"]),
        ))
        .step(Step::add_column(
            "production_plan",
            ColumnDef::new("bom_id", "VARCHAR(100)"),
        ))
        .step(Step::create_index(
            "production_plan",
            IndexDef::new("idx_bom_id", &["bom_id"]),
        ))
        .step(Step::add_column(
            "production_plan_raw_material",
            ColumnDef::new("material_status", "VARCHAR(50)").default_str("pending"),
        ))
        .step(Step::add_column(
            "production_plan_raw_material",
            ColumnDef::new("mr_id", "VARCHAR(50)"),
        ))
        .step(Step::create_index(
            "production_plan_raw_material",
            IndexDef::new("idx_pprm_mr_id", &["mr_id"]),
        ))
}

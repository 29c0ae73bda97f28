use nobal_migration_core::{ColumnDef, IndexDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    Migration::new(17, "sales_order_bom_details")
        .description("BOM snapshots on sales orders")
        .step(Step::add_column(
            "selling_sales_order",
            ColumnDef::new("bom_finished_goods", "LONGTEXT").after("order_type"),
        ))
        .step(Step::add_column(
            "selling_sales_order",
            ColumnDef::new("bom_raw_materials", "LONGTEXT").after("bom_finished_goods"),
        ))
        .step(Step::add_column(
            "selling_sales_order",
            ColumnDef::new("bom_operations", "LONGTEXT").after("bom_raw_materials"),
        ))
        .step(Step::create_index(
            "selling_sales_order",
            IndexDef::new("idx_bom_id", &["bom_id"]),
        ))
        .step(Step::create_index(
            "selling_sales_order",
            IndexDef::new("idx_customer_id", &["customer_id"]),
        ))
}

//! 工单、工作站、工序与生产计划

use nobal_migration_core::{
    ColumnDef, ForeignKeyDef, IndexDef, Migration, ReferentialAction, Step, TableDef,
};

use crate::columns::{code, created_at, id, quantity, updated_at};

pub(crate) fn migration() -> Migration {
    Migration::new(2, "manufacturing_base")
        .description("Work orders, workstations, operations and production plans")
        .step(Step::create_table(
            TableDef::new("work_order")
                .column(code("wo_id"))
                .column(ColumnDef::new("item_code", "VARCHAR(100)").not_null())
                .column(ColumnDef::new("quantity", "DECIMAL(18,6)").not_null().default_expr("1"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("Draft"))
                .column(ColumnDef::new("priority", "VARCHAR(20)").default_str("medium"))
                .column(ColumnDef::new("sales_order_id", "VARCHAR(50)"))
                .column(created_at())
                .column(updated_at())
                .primary_key(&["wo_id"])
                .index(IndexDef::new("idx_status", &["status"])),
        ))
        .step(Step::create_table(
            TableDef::new("workstation")
                .column(id())
                .column(ColumnDef::new("name", "VARCHAR(100)").not_null())
                .column(ColumnDef::new("workstation_type", "VARCHAR(100)"))
                .column(ColumnDef::new("location", "VARCHAR(100)"))
                .column(ColumnDef::new("capacity_per_hour", "DECIMAL(10,2)").default_expr("0"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("active"))
                .column(created_at())
                .primary_key(&["id"])
                .index(IndexDef::unique("uk_workstation_name", &["name"])),
        ))
        .step(Step::create_table(
            TableDef::new("operation")
                .column(ColumnDef::new("name", "VARCHAR(100)").not_null())
                .column(ColumnDef::new("description", "TEXT"))
                .column(ColumnDef::new("default_workstation", "VARCHAR(100)"))
                .column(created_at())
                .primary_key(&["name"]),
        ))
        .step(Step::create_table(
            TableDef::new("work_order_operation")
                .column(id())
                .column(code("wo_id"))
                .column(ColumnDef::new("operation", "VARCHAR(100)"))
                .column(ColumnDef::new("workstation", "VARCHAR(100)"))
                .column(ColumnDef::new("time", "DECIMAL(10,2)").default_expr("0"))
                .column(quantity("completed_qty"))
                .column(ColumnDef::new("sequence", "INT"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("pending"))
                .primary_key(&["id"])
                .index(IndexDef::new("idx_wo_id", &["wo_id"]))
                .foreign_key(
                    ForeignKeyDef::new("fk_work_order_operation_wo", "wo_id", "work_order", "wo_id")
                        .on_delete(ReferentialAction::Cascade),
                ),
        ))
        .step(Step::create_table(
            TableDef::new("production_plan")
                .column(code("plan_id"))
                .column(ColumnDef::new("plan_date", "DATE"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("draft"))
                .column(ColumnDef::new("company", "VARCHAR(100)"))
                .column(created_at())
                .primary_key(&["plan_id"]),
        ))
        .step(Step::create_table(
            TableDef::new("production_plan_raw_material")
                .column(id())
                .column(code("plan_id"))
                .column(ColumnDef::new("item_code", "VARCHAR(100)").not_null())
                .column(quantity("required_qty"))
                .column(ColumnDef::new("warehouse", "VARCHAR(100)"))
                .primary_key(&["id"])
                .index(IndexDef::new("idx_pprm_plan_id", &["plan_id"]))
                .foreign_key(
                    ForeignKeyDef::new("fk_pprm_plan", "plan_id", "production_plan", "plan_id")
                        .on_delete(ReferentialAction::Cascade),
                ),
        ))
        .step(Step::create_table(
            TableDef::new("operation_execution_log")
                .column(id())
                .column(code("job_card_id"))
                .column(ColumnDef::new("workstation_id", "VARCHAR(100)"))
                .column(ColumnDef::new("event_type", "VARCHAR(50)").not_null())
                .column(
                    ColumnDef::new("event_timestamp", "TIMESTAMP")
                        .default_expr("CURRENT_TIMESTAMP"),
                )
                .column(quantity("quantity"))
                .column(ColumnDef::new("notes", "TEXT"))
                .primary_key(&["id"])
                .index(IndexDef::new("idx_oel_job_card", &["job_card_id"])),
        ))
}

//! 工序卡

use nobal_migration_core::{
    ColumnDef, ForeignKeyDef, IndexDef, Migration, ReferentialAction, Step, TableDef,
};

use crate::columns::{code, created_at, quantity, updated_at};

pub(crate) fn migration() -> Migration {
    Migration::new(6, "job_card")
        .description("Job cards tracking one operation of a work order")
        .step(Step::create_table(
            TableDef::new("job_card")
                .column(code("job_card_id"))
                .column(ColumnDef::new("work_order_id", "VARCHAR(50)"))
                .column(ColumnDef::new("operation", "VARCHAR(255)"))
                .column(ColumnDef::new("operation_time", "DECIMAL(10,2)").default_expr("0"))
                .column(ColumnDef::new("machine_id", "VARCHAR(100)"))
                .column(ColumnDef::new("operator_id", "VARCHAR(100)"))
                .column(ColumnDef::new("planned_quantity", "DECIMAL(18,6)"))
                .column(quantity("produced_quantity"))
                .column(quantity("rejected_quantity"))
                .column(ColumnDef::new("scheduled_start_date", "DATETIME"))
                .column(ColumnDef::new("scheduled_end_date", "DATETIME"))
                .column(ColumnDef::new("actual_start_date", "DATETIME"))
                .column(ColumnDef::new("actual_end_date", "DATETIME"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("Open"))
                .column(ColumnDef::new("notes", "TEXT"))
                .column(ColumnDef::new("created_by", "VARCHAR(100)"))
                .column(created_at())
                .column(updated_at())
                .primary_key(&["job_card_id"])
                .index(IndexDef::new("idx_work_order_id", &["work_order_id"]))
                .index(IndexDef::new("idx_status", &["status"]))
                .index(IndexDef::new("idx_machine_id", &["machine_id"]))
                .foreign_key(
                    ForeignKeyDef::new(
                        "fk_job_card_work_order",
                        "work_order_id",
                        "work_order",
                        "wo_id",
                    )
                    .on_delete(ReferentialAction::SetNull),
                ),
        ))
}

//! 物料清单：表头、明细、工序、废料

use nobal_migration_core::{
    ColumnDef, ForeignKeyDef, IndexDef, Migration, ReferentialAction, Step, TableDef,
};

use crate::columns::{code, created_at, quantity, updated_at};

fn bom_child(name: &str, fk_name: &str) -> TableDef {
    TableDef::new(name).foreign_key(
        ForeignKeyDef::new(fk_name, "bom_id", "bom", "bom_id")
            .on_delete(ReferentialAction::Cascade),
    )
}

pub(crate) fn migration() -> Migration {
    Migration::new(4, "bom_tables")
        .description("Bill of materials header, lines, operations and scrap items")
        .step(Step::create_table(
            TableDef::new("bom")
                .column(code("bom_id"))
                .column(ColumnDef::new("item_code", "VARCHAR(100)").not_null())
                .column(ColumnDef::new("description", "TEXT"))
                .column(quantity("quantity").default_expr("1"))
                .column(ColumnDef::new("uom", "VARCHAR(50)"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("Draft"))
                .column(ColumnDef::new("revision", "INT").default_expr("1"))
                .column(ColumnDef::new("effective_date", "DATE"))
                .column(ColumnDef::new("created_by", "VARCHAR(100)"))
                .column(created_at())
                .column(updated_at())
                .primary_key(&["bom_id"])
                .index(IndexDef::new("idx_status", &["status"]))
                .index(IndexDef::new("idx_item_code", &["item_code"]))
                .index(IndexDef::new("idx_created_at", &["created_at"])),
        ))
        .step(Step::create_table(
            bom_child("bom_line", "fk_bom_line_bom")
                .column(ColumnDef::new("line_id", "INT").auto_increment())
                .column(code("bom_id"))
                .column(ColumnDef::new("component_code", "VARCHAR(100)").not_null())
                .column(ColumnDef::new("quantity", "DECIMAL(18,6)").not_null())
                .column(ColumnDef::new("uom", "VARCHAR(50)"))
                .column(ColumnDef::new("component_description", "TEXT"))
                .column(ColumnDef::new("component_type", "VARCHAR(50)"))
                .column(ColumnDef::new("sequence", "INT"))
                .column(ColumnDef::new("notes", "TEXT"))
                .column(created_at())
                .primary_key(&["line_id"])
                .index(IndexDef::new("idx_bom_id", &["bom_id"]))
                .index(IndexDef::new("idx_component_code", &["component_code"])),
        ))
        .step(Step::create_table(
            bom_child("bom_operation", "fk_bom_operation_bom")
                .column(ColumnDef::new("operation_id", "INT").auto_increment())
                .column(code("bom_id"))
                .column(ColumnDef::new("operation_name", "VARCHAR(255)"))
                .column(ColumnDef::new("workstation_type", "VARCHAR(100)"))
                .column(ColumnDef::new("operation_time", "DECIMAL(10,2)"))
                .column(ColumnDef::new("fixed_time", "DECIMAL(10,2)"))
                .column(ColumnDef::new("operating_cost", "DECIMAL(12,4)"))
                .column(ColumnDef::new("sequence", "INT"))
                .column(ColumnDef::new("notes", "LONGTEXT"))
                .column(created_at())
                .column(updated_at())
                .primary_key(&["operation_id"])
                .index(IndexDef::new("idx_bom_id", &["bom_id"]))
                .index(IndexDef::new("idx_sequence", &["sequence"])),
        ))
        .step(Step::create_table(
            bom_child("bom_scrap", "fk_bom_scrap_bom")
                .column(ColumnDef::new("scrap_id", "INT").auto_increment())
                .column(code("bom_id"))
                .column(ColumnDef::new("item_code", "VARCHAR(100)").not_null())
                .column(ColumnDef::new("item_name", "VARCHAR(255)"))
                .column(quantity("input_quantity"))
                .column(ColumnDef::new("loss_percentage", "DECIMAL(5,2)").default_expr("0"))
                .column(ColumnDef::new("rate", "DECIMAL(18,2)").default_expr("0"))
                .column(created_at())
                .primary_key(&["scrap_id"])
                .index(IndexDef::new("idx_bom_id", &["bom_id"])),
        ))
}

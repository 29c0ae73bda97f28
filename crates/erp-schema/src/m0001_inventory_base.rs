//! 物料、领料申请、收货申请与库存表

use nobal_migration_core::{
    ColumnDef, ForeignKeyDef, IndexDef, Migration, ReferentialAction, Step, TableDef,
};

use crate::columns::{amount, code, created_at, id, quantity, updated_at};

pub(crate) fn migration() -> Migration {
    Migration::new(1, "inventory_base")
        .description("Item master, material requests, GRN requests and stock tables")
        .step(Step::create_table(
            TableDef::new("item")
                .column(id())
                .column(code("item_code"))
                .column(ColumnDef::new("name", "VARCHAR(255)").not_null())
                .column(ColumnDef::new("item_group", "VARCHAR(100)"))
                .column(ColumnDef::new("uom", "VARCHAR(50)"))
                .column(ColumnDef::new("hsn_code", "VARCHAR(20)"))
                .column(ColumnDef::new("gst_rate", "DECIMAL(5,2)").default_expr("0"))
                .column(amount("valuation_rate"))
                .column(created_at())
                .primary_key(&["item_code"])
                .index(IndexDef::unique("uk_item_id", &["id"])),
        ))
        .step(Step::create_table(
            TableDef::new("material_request")
                .column(code("mr_id"))
                .column(ColumnDef::new("department", "VARCHAR(100)"))
                .column(ColumnDef::new("purpose", "VARCHAR(100)"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("draft"))
                .column(ColumnDef::new("requested_by", "VARCHAR(100)"))
                .column(ColumnDef::new("required_by_date", "DATE"))
                .column(created_at())
                .primary_key(&["mr_id"]),
        ))
        .step(Step::create_table(
            TableDef::new("material_request_item")
                .column(id())
                .column(code("mr_id"))
                .column(code("item_code"))
                .column(quantity("qty").not_null())
                .column(ColumnDef::new("uom", "VARCHAR(50)"))
                .primary_key(&["id"])
                .index(IndexDef::new("idx_mr_id", &["mr_id"]))
                .foreign_key(
                    ForeignKeyDef::new(
                        "fk_material_request_item_mr",
                        "mr_id",
                        "material_request",
                        "mr_id",
                    )
                    .on_delete(ReferentialAction::Cascade),
                ),
        ))
        .step(Step::create_table(
            TableDef::new("grn_requests")
                .column(id())
                .column(code("grn_no"))
                .column(ColumnDef::new("po_no", "VARCHAR(50)"))
                .column(ColumnDef::new("supplier_id", "VARCHAR(50)"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("pending"))
                .column(ColumnDef::new("receipt_date", "DATE"))
                .column(created_at())
                .primary_key(&["id"])
                .index(IndexDef::unique("uk_grn_no", &["grn_no"])),
        ))
        .step(Step::create_table(
            TableDef::new("stock_entry_items")
                .column(id())
                .column(ColumnDef::new("stock_entry_id", "INT").not_null())
                .column(ColumnDef::new("item_id", "INT"))
                .column(quantity("qty").not_null())
                .column(ColumnDef::new("uom", "VARCHAR(50)"))
                .primary_key(&["id"])
                .index(IndexDef::new("idx_stock_entry_id", &["stock_entry_id"])),
        ))
        .step(Step::create_table(
            TableDef::new("stock_balance")
                .column(id())
                .column(ColumnDef::new("item_id", "INT"))
                .column(ColumnDef::new("warehouse_id", "INT").not_null())
                .column(quantity("current_qty"))
                .column(amount("valuation_rate"))
                .column(updated_at())
                .primary_key(&["id"])
                .index(IndexDef::new("idx_warehouse_id", &["warehouse_id"])),
        ))
        .step(Step::create_table(
            TableDef::new("stock_ledger")
                .column(id())
                .column(ColumnDef::new("item_id", "INT"))
                .column(ColumnDef::new("warehouse_id", "INT").not_null())
                .column(ColumnDef::new("transaction_date", "DATETIME").not_null())
                .column(
                    ColumnDef::enumeration(
                        "transaction_type",
                        &[
                            "Purchase Receipt",
                            "Issue",
                            "Transfer",
                            "Manufacturing Return",
                            "Repack",
                            "Scrap Entry",
                            "Reconciliation",
                            "Adjustment",
                        ],
                    )
                    .not_null(),
                )
                .column(quantity("qty_in"))
                .column(quantity("qty_out"))
                .column(ColumnDef::new("reference_doctype", "VARCHAR(50)"))
                .column(ColumnDef::new("reference_name", "VARCHAR(50)"))
                .column(created_at())
                .primary_key(&["id"])
                .index(IndexDef::new("idx_transaction_date", &["transaction_date"])),
        ))
}

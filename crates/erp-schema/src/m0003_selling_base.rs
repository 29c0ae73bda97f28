//! 客户、销售订单与报价单
//!
//! 订单和报价单的外键最初指向旧表 `selling_customer`，见 m0019

use nobal_migration_core::{ColumnDef, ForeignKeyDef, Migration, Step, TableDef};

use crate::columns::{amount, code, created_at, quantity, updated_at};

pub(crate) fn migration() -> Migration {
    Migration::new(3, "selling_base")
        .description("Customers, sales orders and quotations")
        .step(Step::create_table(
            TableDef::new("customer")
                .column(code("customer_id"))
                .column(ColumnDef::new("name", "VARCHAR(255)").not_null())
                .column(ColumnDef::new("email", "VARCHAR(100)"))
                .column(ColumnDef::new("phone", "VARCHAR(20)"))
                .column(ColumnDef::new("gstin", "VARCHAR(20)"))
                .column(ColumnDef::new("status", "VARCHAR(20)").default_str("active"))
                .column(created_at())
                .primary_key(&["customer_id"]),
        ))
        .step(Step::create_table(
            TableDef::new("selling_customer")
                .column(code("customer_id"))
                .column(ColumnDef::new("name", "VARCHAR(255)").not_null())
                .column(ColumnDef::new("email", "VARCHAR(100)"))
                .column(ColumnDef::new("phone", "VARCHAR(20)"))
                .column(created_at())
                .primary_key(&["customer_id"]),
        ))
        .step(Step::create_table(
            TableDef::new("selling_sales_order")
                .column(code("sales_order_id"))
                .column(code("customer_id"))
                .column(ColumnDef::new("order_type", "VARCHAR(50)"))
                .column(ColumnDef::new("bom_id", "VARCHAR(50)"))
                .column(quantity("quantity").default_expr("1"))
                .column(amount("order_amount"))
                .column(ColumnDef::new("delivery_date", "DATE"))
                .column(
                    ColumnDef::enumeration(
                        "status",
                        &["draft", "confirmed", "shipped", "invoiced", "cancelled"],
                    )
                    .default_str("draft"),
                )
                .column(created_at())
                .column(updated_at())
                .column(ColumnDef::new("deleted_at", "TIMESTAMP"))
                .primary_key(&["sales_order_id"])
                .foreign_key(ForeignKeyDef::new(
                    "selling_sales_order_ibfk_1",
                    "customer_id",
                    "selling_customer",
                    "customer_id",
                )),
        ))
        .step(Step::create_table(
            TableDef::new("selling_quotation")
                .column(code("quotation_id"))
                .column(code("customer_id"))
                .column(amount("amount"))
                .column(ColumnDef::new("status", "VARCHAR(50)").default_str("draft"))
                .column(ColumnDef::new("valid_till", "DATE"))
                .column(created_at())
                .primary_key(&["quotation_id"])
                .foreign_key(ForeignKeyDef::new(
                    "selling_quotation_ibfk_1",
                    "customer_id",
                    "selling_customer",
                    "customer_id",
                )),
        ))
}

//! 销售订单状态改版
//!
//! 先放宽为 VARCHAR，再映射旧状态，最后收紧为新 ENUM

use nobal_migration_core::{ColumnDef, Migration, Step};

const REMAP: [(&str, &str); 4] = [
    ("confirmed", "production"),
    ("shipped", "dispatched"),
    ("invoiced", "delivered"),
    ("cancelled", "on_hold"),
];

pub(crate) fn migration() -> Migration {
    let remap = REMAP.iter().map(|(from, to)| {
        Step::execute(
            format!("remap sales order status {} -> {}", from, to),
            format!(
                "UPDATE selling_sales_order SET status = '{}' WHERE status = '{}'",
                to, from
            ),
        )
    });

    Migration::new(18, "sales_order_status_v2")
        .description("Production-oriented sales order statuses")
        .step(Step::modify_column(
            "selling_sales_order",
            ColumnDef::new("status", "VARCHAR(50)"),
        ))
        .steps(remap)
        .step(Step::modify_column(
            "selling_sales_order",
            ColumnDef::enumeration(
                "status",
                &[
                    "draft",
                    "production",
                    "complete",
                    "on_hold",
                    "dispatched",
                    "delivered",
                ],
            )
            .default_str("draft"),
        ))
}

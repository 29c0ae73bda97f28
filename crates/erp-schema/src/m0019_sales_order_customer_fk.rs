//! 订单和报价单的客户外键改指向 `customer`

use nobal_migration_core::{ForeignKeyDef, Migration, Step};

fn repoint(table: &str) -> [Step; 2] {
    let name = format!("{}_ibfk_1", table);
    [
        Step::drop_foreign_key(table, name.clone()),
        Step::add_foreign_key(
            table,
            ForeignKeyDef::new(name, "customer_id", "customer", "customer_id"),
        ),
    ]
}

pub(crate) fn migration() -> Migration {
    Migration::new(19, "sales_order_customer_fk")
        .description("Point sales order and quotation customer keys at the customer table")
        .steps(
            ["selling_sales_order", "selling_quotation"]
                .into_iter()
                .flat_map(repoint),
        )
}

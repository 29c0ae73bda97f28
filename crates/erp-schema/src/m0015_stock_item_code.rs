//! 库存表改用物料编码
//!
//! 每张表依次：加可空列、按 `item.id` 回填、兜底为 `UNKNOWN`、改为 NOT NULL

use nobal_migration_core::{ColumnDef, Migration, Step};

const TABLES: [&str; 3] = ["stock_entry_items", "stock_balance", "stock_ledger"];

fn item_code() -> ColumnDef {
    ColumnDef::new("item_code", "VARCHAR(50)")
}

fn backfill(table: &str) -> [Step; 4] {
    [
        Step::add_column(table, item_code().after("item_id")),
        Step::execute(
            format!("backfill {}.item_code from item", table),
            format!(
                "UPDATE `{table}` t SET t.item_code = \
                 (SELECT i.item_code FROM item i WHERE i.id = t.item_id LIMIT 1) \
                 WHERE t.item_code IS NULL"
            ),
        ),
        Step::execute(
            format!("mark unmatched {}.item_code as UNKNOWN", table),
            format!("UPDATE `{table}` SET item_code = 'UNKNOWN' WHERE item_code IS NULL"),
        ),
        Step::modify_column(table, item_code().not_null()),
    ]
}

pub(crate) fn migration() -> Migration {
    Migration::new(15, "stock_item_code")
        .description("Item code on stock entry items, balances and ledger")
        .steps(TABLES.into_iter().flat_map(backfill))
}

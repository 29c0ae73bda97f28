use nobal_migration_core::{ColumnDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    Migration::new(16, "stock_ledger_transaction_types")
        .description("Widen the stock ledger transaction type enum")
        .step(Step::modify_column(
            "stock_ledger",
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
                    "IN",
                    "OUT",
                    "Receipt",
                    "Other",
                    "Opening",
                ],
            )
            .not_null(),
        ))
}

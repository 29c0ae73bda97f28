//! 工序卡外协字段

use nobal_migration_core::{ColumnDef, Migration, Step};

use crate::columns::quantity;

pub(crate) fn migration() -> Migration {
    let mut columns = vec![
        ColumnDef::enumeration("execution_mode", &["IN_HOUSE", "OUTSOURCE"])
            .default_str("IN_HOUSE"),
        ColumnDef::enumeration(
            "subcontract_status",
            &[
                "DRAFT",
                "READY",
                "SENT_TO_VENDOR",
                "PARTIALLY_RECEIVED",
                "RECEIVED",
                "COMPLETED",
            ],
        )
        .default_str("DRAFT"),
    ];
    columns.extend(
        [
            "sent_qty",
            "received_qty",
            "accepted_qty",
            "rejected_qty",
            "transferred_quantity",
        ]
        .into_iter()
        .map(quantity),
    );
    columns.push(ColumnDef::new("vendor_id", "VARCHAR(50)"));

    Migration::new(8, "job_card_subcontracting")
        .description("Outsourcing mode, vendor and quantity tracking on job cards")
        .steps(columns.into_iter().map(|c| Step::add_column("job_card", c)))
}

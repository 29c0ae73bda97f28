use nobal_migration_core::{ColumnDef, IndexDef, Migration, Step};

fn operation_type() -> ColumnDef {
    ColumnDef::enumeration("operation_type", &["IN_HOUSE", "OUTSOURCED"]).default_str("IN_HOUSE")
}

pub(crate) fn migration() -> Migration {
    let mut migration = Migration::new(9, "operation_type")
        .description("In-house / outsourced flag on operations and BOM operations");
    for table in ["operation", "bom_operation"] {
        migration = migration
            .step(Step::add_column(table, operation_type()))
            .step(Step::create_index(
                table,
                IndexDef::new("idx_operation_type", &["operation_type"]),
            ));
    }
    migration
}

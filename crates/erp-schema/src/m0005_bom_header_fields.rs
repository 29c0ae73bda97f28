use nobal_migration_core::{ColumnDef, Migration, Step};

use crate::columns::flag;

pub(crate) fn migration() -> Migration {
    let columns = [
        ColumnDef::new("product_name", "VARCHAR(255)"),
        flag("is_active", true),
        flag("is_default", false),
        flag("allow_alternative_item", false),
        flag("auto_sub_assembly_rate", false),
        ColumnDef::new("project", "VARCHAR(100)"),
        ColumnDef::new("cost_rate_based_on", "VARCHAR(50)").default_str("Valuation Rate"),
        ColumnDef::new("currency", "VARCHAR(10)").default_str("INR"),
        flag("with_operations", false),
        ColumnDef::new("process_loss_percentage", "DECIMAL(5,2)").default_expr("0"),
    ];

    Migration::new(5, "bom_header_fields")
        .description("Costing and behaviour flags on the BOM header")
        .steps(columns.into_iter().map(|c| Step::add_column("bom", c)))
}

use nobal_migration_core::{ColumnDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    let mut columns = vec![ColumnDef::new("bom_no", "VARCHAR(100)")];
    columns.extend(
        [
            "planned_start_date",
            "planned_end_date",
            "actual_start_date",
            "actual_end_date",
            "expected_delivery_date",
        ]
        .into_iter()
        .map(|name| ColumnDef::new(name, "DATETIME")),
    );

    Migration::new(7, "work_order_planning_dates")
        .description("BOM reference and planned/actual dates on work orders")
        .steps(columns.into_iter().map(|c| Step::add_column("work_order", c)))
}

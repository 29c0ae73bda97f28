use nobal_migration_core::{ColumnDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    Migration::new(10, "hourly_rates")
        .description("Hourly cost rates for job cards, work order operations and workstations")
        .step(Step::add_column(
            "job_card",
            ColumnDef::new("hourly_rate", "DECIMAL(18,2)")
                .default_expr("0")
                .after("operation_time"),
        ))
        .step(Step::add_column(
            "work_order_operation",
            ColumnDef::new("hourly_rate", "DECIMAL(18,2)")
                .default_expr("0")
                .after("time"),
        ))
        .step(Step::add_column(
            "workstation",
            ColumnDef::new("rate_per_hour", "DECIMAL(10,2)")
                .default_expr("0")
                .after("capacity_per_hour"),
        ))
}

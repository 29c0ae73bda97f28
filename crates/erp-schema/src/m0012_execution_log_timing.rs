use nobal_migration_core::{ColumnDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    Migration::new(12, "execution_log_timing")
        .description("Operator and start time on operation execution log entries")
        .step(Step::add_column(
            "operation_execution_log",
            ColumnDef::new("operator_id", "VARCHAR(100)").after("workstation_id"),
        ))
        .step(Step::add_column(
            "operation_execution_log",
            ColumnDef::new("start_date", "DATE").after("operator_id"),
        ))
        .step(Step::add_column(
            "operation_execution_log",
            ColumnDef::new("start_time", "TIME").after("start_date"),
        ))
}

//! 工作站分析指标

use nobal_migration_core::{ColumnDef, Migration, Step};

pub(crate) fn migration() -> Migration {
    let hours = ["allocation_time", "downtime", "uptime_hours"]
        .map(|name| ColumnDef::new(name, "DECIMAL(10,2)").default_expr("0"));
    let percentages = ["performance_percentage", "efficiency_percentage", "rejection_rate"]
        .map(|name| ColumnDef::new(name, "DECIMAL(5,2)").default_expr("0"));
    let counters = ["total_jobs", "completed_jobs"]
        .map(|name| ColumnDef::new(name, "INT").default_expr("0"));
    let dates = ["last_maintenance_date", "next_maintenance_date"]
        .map(|name| ColumnDef::new(name, "DATE"));

    let columns = hours
        .into_iter()
        .chain(percentages)
        .chain([ColumnDef::new("operations_assigned", "TEXT")])
        .chain(counters)
        .chain(dates);

    Migration::new(11, "workstation_analysis")
        .description("Utilisation, quality and maintenance metrics on workstations")
        .steps(columns.map(|c| Step::add_column("workstation", c)))
}

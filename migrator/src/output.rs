//! 命令输出
//!
//! 结果写到 stdout：默认为可读文本，`--json` 时为格式化 JSON。日志走 stderr

use std::fmt::Write;

use nobal_adapter_mysql::{ColumnDetail, ForeignKeyInfo, TableSummary, TruncatedTable};
use nobal_errors::{AppError, AppResult};
use nobal_migration_core::{
    Drift, MigrationState, PlannedAction, PlannedMigration, RunReport, StatusReport, StepOutcome,
};
use nobal_telemetry::HealthStatus;
use serde::Serialize;

use crate::commands::VersionList;
use crate::probe::ProbeResult;

pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn emit<T: Serialize + ?Sized>(
        &self,
        value: &T,
        render: impl FnOnce(&T) -> String,
    ) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", render(value));
        }
        Ok(())
    }
}

pub fn render_error(error: &AppError, json: bool) -> String {
    if json {
        serde_json::to_string_pretty(&error.to_report()).unwrap_or_else(|_| error.to_string())
    } else {
        format!("error: {}", error)
    }
}

fn outcome_label(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Applied { rows_affected } if *rows_affected > 0 => {
            format!("applied ({} rows)", rows_affected)
        }
        StepOutcome::Degraded { reason } => format!("degraded: {}", reason),
        other => other.label().to_string(),
    }
}

pub fn render_run_report(report: &RunReport) -> String {
    let mut out = String::new();
    if report.applied.is_empty() && report.failure.is_none() {
        let _ = writeln!(out, "Nothing to migrate, {} already applied", report.skipped.len());
        return out;
    }

    for migration in &report.applied {
        let _ = writeln!(
            out,
            "{:04} {} ({} ms)",
            migration.version, migration.name, migration.execution_ms
        );
        for step in &migration.steps {
            let _ = writeln!(out, "  - {}: {}", step.description, outcome_label(&step.outcome));
        }
    }

    if let Some(failure) = &report.failure {
        let _ = writeln!(out, "{:04} {} FAILED", failure.version, failure.name);
        for step in &failure.completed_steps {
            let _ = writeln!(out, "  - {}: {}", step.description, outcome_label(&step.outcome));
        }
        match (&failure.step_index, &failure.step) {
            (Some(index), Some(step)) => {
                let _ = writeln!(out, "  x step {}: {}", index + 1, step);
            }
            _ => {
                let _ = writeln!(out, "  x recording the migration");
            }
        }
        let _ = writeln!(out, "  {}", failure.error.detail);
        let _ = writeln!(out, "Later migrations were not attempted.");
    }

    let degraded: usize = report.applied.iter().map(|m| m.degraded_steps()).sum();
    let _ = writeln!(
        out,
        "Applied {} migration(s), {} degraded step(s)",
        report.applied_count(),
        degraded
    );
    out
}

pub fn render_plan(plan: &[PlannedMigration]) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        let _ = writeln!(out, "Nothing to migrate");
        return out;
    }
    for migration in plan {
        let _ = writeln!(out, "{:04} {}", migration.version, migration.name);
        for step in &migration.steps {
            let label = match &step.action {
                PlannedAction::WillApply => "apply".to_string(),
                PlannedAction::AlreadyPresent => "present".to_string(),
                PlannedAction::WillDegrade { reason } => format!("degrade: {}", reason),
                PlannedAction::WillFail { reason } => format!("FAIL: {}", reason),
            };
            let _ = writeln!(out, "  - {}: {}", step.description, label);
            if step.action == PlannedAction::WillApply {
                for line in step.statement.lines() {
                    let _ = writeln!(out, "      {}", line);
                }
            }
        }
    }
    out
}

pub fn render_status(status: &StatusReport) -> String {
    let mut out = String::new();
    if !status.ledger_exists {
        let _ = writeln!(out, "Migration ledger not created yet");
    }
    for migration in &status.migrations {
        let state = match &migration.state {
            MigrationState::Applied {
                applied_at,
                baseline: true,
            } => format!("baseline  {}", applied_at.format("%Y-%m-%d %H:%M:%S")),
            MigrationState::Applied { applied_at, .. } => {
                format!("applied   {}", applied_at.format("%Y-%m-%d %H:%M:%S"))
            }
            MigrationState::Pending => "pending".to_string(),
            MigrationState::Drifted { .. } => "DRIFTED (checksum changed)".to_string(),
        };
        let _ = writeln!(out, "{:04} {:<36} {}", migration.version, migration.name, state);
    }
    for unknown in &status.unknown {
        let _ = writeln!(
            out,
            "{:04} {:<36} unknown to this build",
            unknown.version, unknown.name
        );
    }
    let _ = writeln!(out, "{} pending", status.pending_count());
    out
}

pub fn render_drift(drift: &[Drift]) -> String {
    let mut out = String::new();
    if drift.is_empty() {
        let _ = writeln!(out, "Ledger matches the catalog");
        return out;
    }
    for entry in drift {
        let line = match entry {
            Drift::ChecksumMismatch {
                version,
                name,
                recorded,
                expected,
            } => format!(
                "{:04} {}: checksum changed (recorded {}, expected {})",
                version,
                name,
                short(recorded),
                short(expected)
            ),
            Drift::UnknownVersion { version, name } => {
                format!("{:04} {}: recorded but not in the catalog", version, name)
            }
            Drift::OutOfOrder {
                version,
                name,
                latest_applied,
            } => format!(
                "{:04} {}: pending but {:04} is already applied",
                version, name, latest_applied
            ),
        };
        let marker = if entry.is_blocking() { "error" } else { "warning" };
        let _ = writeln!(out, "{}: {}", marker, line);
    }
    out
}

fn short(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}

pub fn render_versions(list: &VersionList) -> String {
    if list.versions.is_empty() {
        return format!("No migrations {}\n", list.action);
    }
    let versions: Vec<String> = list.versions.iter().map(|v| format!("{:04}", v)).collect();
    format!("{} {}\n", capitalize(list.action), versions.join(", "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn render_tables(tables: &[TableSummary]) -> String {
    let mut out = String::new();
    for table in tables {
        let rows = table
            .estimated_rows
            .map(|r| format!("~{} rows", r))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<40} {:<8} {}",
            table.name,
            table.engine.as_deref().unwrap_or("-"),
            rows
        );
    }
    let _ = writeln!(out, "{} tables", tables.len());
    out
}

pub fn render_columns(table: &str, columns: &[ColumnDetail]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", table);
    for column in columns {
        let _ = writeln!(
            out,
            "  {:<32} {:<40} {:<8} {:<4} {:<16} {}",
            column.name,
            column.column_type,
            if column.nullable { "NULL" } else { "NOT NULL" },
            column.key,
            column.default.as_deref().unwrap_or("-"),
            column.extra
        );
    }
    out
}

pub fn render_foreign_keys(table: &str, keys: &[ForeignKeyInfo]) -> String {
    let mut out = String::new();
    if keys.is_empty() {
        let _ = writeln!(out, "No foreign keys on or referencing `{}`", table);
        return out;
    }
    for key in keys {
        let direction = if key.table == table { "->" } else { "<-" };
        let _ = writeln!(
            out,
            "{} {} {}.{} references {}.{} (on delete {}, on update {})",
            direction,
            key.name,
            key.table,
            key.column,
            key.referenced_table,
            key.referenced_column,
            key.on_delete,
            key.on_update
        );
    }
    out
}

pub fn render_truncated(tables: &[TruncatedTable]) -> String {
    let mut out = String::new();
    for table in tables {
        let _ = writeln!(out, "Truncated {} ({} rows)", table.table, table.rows_before);
    }
    out
}

pub fn render_probe(results: &[ProbeResult]) -> String {
    let mut out = String::new();
    for result in results {
        let status = match (result.status, &result.error) {
            (Some(code), _) => code.to_string(),
            (None, Some(error)) => format!("error: {}", error),
            (None, None) => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{} {:<48} {} ({} ms)",
            if result.ok { "ok  " } else { "FAIL" },
            result.url,
            status,
            result.latency_ms
        );
    }
    out
}

pub fn render_health(status: &HealthStatus) -> String {
    let mut out = String::new();
    for check in &status.checks {
        let _ = writeln!(
            out,
            "{} {:<16} {}",
            if check.healthy { "ok  " } else { "FAIL" },
            check.name,
            check.message.as_deref().unwrap_or("")
        );
    }
    let _ = writeln!(
        out,
        "{}",
        if status.healthy { "healthy" } else { "unhealthy" }
    );
    out
}

//! 子命令处理

use std::process::ExitCode;

use nobal_adapter_mysql::{
    check_truncate_targets, current_database, server_version, truncate_tables,
};
use nobal_bootstrap::Infrastructure;
use nobal_config::AppConfig;
use nobal_errors::{AppError, AppResult};
use nobal_migration_core::Catalog;
use nobal_ports::{MigrationLedger, MigrationLock};
use nobal_telemetry::HealthStatus;
use serde::Serialize;
use tracing::{info, warn};

use crate::output::{self, Output};
use crate::probe::Prober;
use crate::{Commands, InspectCommands};

/// 计划中有无法执行的步骤、或存在阻断性漂移，与 failed_precondition 一致
const EXIT_PRECONDITION: u8 = 76;
/// 探测失败、体检不通过（EX_UNAVAILABLE）
const EXIT_UNAVAILABLE: u8 = 69;

pub async fn run(command: Commands, config: AppConfig, json: bool) -> AppResult<ExitCode> {
    let out = Output::new(json);

    // 不需要数据库的命令
    match command {
        Commands::Probe => return probe(&config, &out).await,
        Commands::Truncate(ref args) => {
            check_truncate_targets(&args.tables, &config.migrator.ledger_table)?;
            if !args.yes {
                return Err(AppError::validation(format!(
                    "truncate deletes every row of {}; re-run with --yes to confirm",
                    args.tables.join(", ")
                )));
            }
        }
        Commands::Doctor => return doctor(config, &out).await,
        _ => {}
    }

    let catalog = nobal_erp_schema::catalog()?;
    let infra = Infrastructure::from_config(config).await?;
    let result = dispatch(command, &infra, &catalog, &out).await;
    infra.close().await;
    result
}

async fn dispatch(
    command: Commands,
    infra: &Infrastructure,
    catalog: &Catalog,
    out: &Output,
) -> AppResult<ExitCode> {
    match command {
        Commands::Migrate(args) if args.dry_run => plan(infra, catalog, args.target.target, out).await,
        Commands::Migrate(args) => {
            let report = infra.migrator()?.migrate(catalog, args.target.target).await?;
            out.emit(&report, output::render_run_report)?;
            Ok(match &report.failure {
                Some(failure) => ExitCode::from(failure.error.exit_code),
                None => ExitCode::SUCCESS,
            })
        }
        Commands::Plan(args) => plan(infra, catalog, args.target, out).await,
        Commands::Status => {
            let status = infra.migrator()?.status(catalog).await?;
            out.emit(&status, output::render_status)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify => {
            let drift = infra.migrator()?.verify(catalog).await?;
            out.emit(&drift, |d| output::render_drift(d))?;
            if drift.iter().any(|d| d.is_blocking()) {
                return Ok(ExitCode::from(EXIT_PRECONDITION));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Baseline(args) => {
            let recorded = infra.migrator()?.baseline(catalog, args.version).await?;
            out.emit(&VersionList::new("baselined", recorded), output::render_versions)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Repair => {
            let repaired = infra.migrator()?.repair(catalog).await?;
            out.emit(&VersionList::new("repaired", repaired), output::render_versions)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect(InspectCommands::Tables) => {
            let tables = infra.inspector().list_tables().await?;
            out.emit(&tables, |t| output::render_tables(t))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect(InspectCommands::Describe { table }) => {
            let columns = infra.inspector().describe_table(&table).await?;
            out.emit(&columns, |c| output::render_columns(&table, c))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect(InspectCommands::ForeignKeys { table }) => {
            let keys = infra.inspector().foreign_keys(&table).await?;
            out.emit(&keys, |k| output::render_foreign_keys(&table, k))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Truncate(args) => {
            warn!(tables = ?args.tables, "Truncating tables");
            let truncated = truncate_tables(infra.pool(), &args.tables, infra.ledger_table()).await?;
            out.emit(&truncated, |t| output::render_truncated(t))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Probe | Commands::Doctor => Err(AppError::internal("command needs no database")),
    }
}

async fn plan(
    infra: &Infrastructure,
    catalog: &Catalog,
    target: Option<i64>,
    out: &Output,
) -> AppResult<ExitCode> {
    let planned = infra.migrator()?.plan(catalog, target).await?;
    out.emit(&planned, |p| output::render_plan(p))?;
    if planned.iter().any(|m| m.will_fail()) {
        return Ok(ExitCode::from(EXIT_PRECONDITION));
    }
    Ok(ExitCode::SUCCESS)
}

/// baseline / repair 的结果
#[derive(Debug, Serialize)]
pub struct VersionList {
    pub action: &'static str,
    pub versions: Vec<i64>,
}

impl VersionList {
    fn new(action: &'static str, versions: Vec<i64>) -> Self {
        Self { action, versions }
    }
}

async fn probe(config: &AppConfig, out: &Output) -> AppResult<ExitCode> {
    let prober = Prober::new(&config.api)?;
    let results = prober.probe_all(&config.api.endpoints).await;
    out.emit(&results, |r| output::render_probe(r))?;

    let failed = results.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        warn!(failed, total = results.len(), "Probe failures");
        return Ok(ExitCode::from(EXIT_UNAVAILABLE));
    }
    Ok(ExitCode::SUCCESS)
}

async fn doctor(config: AppConfig, out: &Output) -> AppResult<ExitCode> {
    let catalog = nobal_erp_schema::catalog()?;
    let mut status = HealthStatus::new();

    let infra = match Infrastructure::from_config(config).await {
        Ok(infra) => infra,
        Err(e) => {
            status.add_check("connection", false, Some(e.to_string()));
            out.emit(&status, output::render_health)?;
            return Ok(ExitCode::from(EXIT_UNAVAILABLE));
        }
    };

    status.record("server_version", server_version(infra.pool()).await, Some);
    status.record("database", current_database(infra.pool()).await, |name| {
        name.or_else(|| Some("no database selected".to_string()))
    });

    if let Some(ledger) = status.require("ledger", infra.ledger()) {
        status.record("ledger", ledger.exists().await, |exists| {
            Some(if exists {
                format!("`{}` present", ledger.table())
            } else {
                format!("`{}` not created yet", ledger.table())
            })
        });
    }

    let lock = infra.lock();
    match lock.is_free().await {
        Ok(true) => status.add_check("lock", true, Some(format!("`{}` free", lock.name()))),
        Ok(false) => status.add_check(
            "lock",
            false,
            Some(format!("`{}` held by another session", lock.name())),
        ),
        Err(e) => status.add_check("lock", false, Some(e.to_string())),
    }

    if let Some(migrator) = status.require("migrator", infra.migrator()) {
        status.record("pending", migrator.status(&catalog).await, |report| {
            Some(format!(
                "{} of {} migrations pending",
                report.pending_count(),
                catalog.len()
            ))
        });
        match migrator.verify(&catalog).await {
            Ok(drift) => {
                let blocking = drift.iter().filter(|d| d.is_blocking()).count();
                status.add_check(
                    "checksums",
                    blocking == 0,
                    Some(format!("{} blocking, {} total drift entries", blocking, drift.len())),
                );
            }
            Err(e) => status.add_check("checksums", false, Some(e.to_string())),
        }
    }

    infra.close().await;
    info!(healthy = status.healthy, "Doctor finished");
    out.emit(&status, output::render_health)?;
    Ok(if status.healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_UNAVAILABLE)
    })
}

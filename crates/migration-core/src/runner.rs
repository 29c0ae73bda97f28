//! 迁移执行器
//!
//! 按版本顺序执行待执行的迁移，成功后登记到台账；
//! 会修改数据库的操作都在迁移锁内进行

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use nobal_errors::{AppError, AppResult};
use nobal_ports::{
    AppliedMigration, MigrationLedger, MigrationLock, SchemaInspector, StatementExecutor,
};
use tracing::{error, info, warn};

use crate::migration::{Catalog, Migration};
use crate::projection::Projection;
use crate::report::{
    AppliedReport, Drift, MigrationFailure, MigrationState, MigrationStatus, PlannedMigration,
    PlannedStep, RunReport, StatusReport, StepOutcome, StepReport,
};

/// 执行选项
#[derive(Debug, Clone)]
pub struct MigratorOptions {
    /// 等待迁移锁的时间
    pub lock_timeout: Duration,
    /// 已应用迁移的校验和不一致时仍继续执行
    pub allow_checksum_drift: bool,
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            allow_checksum_drift: false,
        }
    }
}

/// 迁移执行器
pub struct Migrator {
    inspector: Arc<dyn SchemaInspector>,
    executor: Arc<dyn StatementExecutor>,
    ledger: Arc<dyn MigrationLedger>,
    lock: Arc<dyn MigrationLock>,
    options: MigratorOptions,
}

impl Migrator {
    pub fn new(
        inspector: Arc<dyn SchemaInspector>,
        executor: Arc<dyn StatementExecutor>,
        ledger: Arc<dyn MigrationLedger>,
        lock: Arc<dyn MigrationLock>,
    ) -> Self {
        Self {
            inspector,
            executor,
            ledger,
            lock,
            options: MigratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MigratorOptions) -> Self {
        self.options = options;
        self
    }

    /// 已应用的迁移，台账表不存在时视为空（不创建）
    async fn applied(&self) -> AppResult<Option<Vec<AppliedMigration>>> {
        if self.ledger.exists().await? {
            Ok(Some(self.ledger.applied().await?))
        } else {
            Ok(None)
        }
    }

    /// 每个迁移的状态
    pub async fn status(&self, catalog: &Catalog) -> AppResult<StatusReport> {
        let applied = self.applied().await?;
        let ledger_exists = applied.is_some();
        let applied = applied.unwrap_or_default();
        let by_version: HashMap<i64, &AppliedMigration> =
            applied.iter().map(|a| (a.version, a)).collect();

        let migrations = catalog
            .migrations()
            .iter()
            .map(|m| {
                let state = match by_version.get(&m.version) {
                    None => MigrationState::Pending,
                    Some(entry) => {
                        let expected = m.checksum();
                        if entry.checksum == expected {
                            MigrationState::Applied {
                                applied_at: entry.applied_at,
                                baseline: entry.baseline,
                            }
                        } else {
                            MigrationState::Drifted {
                                recorded: entry.checksum.clone(),
                                expected,
                            }
                        }
                    }
                };
                MigrationStatus {
                    version: m.version,
                    name: m.name.clone(),
                    state,
                }
            })
            .collect();

        let unknown = applied
            .iter()
            .filter(|a| catalog.get(a.version).is_none())
            .cloned()
            .collect();

        Ok(StatusReport {
            ledger_exists,
            migrations,
            unknown,
        })
    }

    /// 检查台账与目录是否一致
    pub async fn verify(&self, catalog: &Catalog) -> AppResult<Vec<Drift>> {
        Ok(match self.applied().await? {
            Some(applied) => detect_drift(catalog, &applied),
            None => Vec::new(),
        })
    }

    /// 试运行：列出待执行迁移的每个步骤会如何处理，不执行任何语句
    pub async fn plan(
        &self,
        catalog: &Catalog,
        target: Option<i64>,
    ) -> AppResult<Vec<PlannedMigration>> {
        let candidates = catalog.up_to(target)?;
        let applied: HashSet<i64> = self
            .applied()
            .await?
            .unwrap_or_default()
            .iter()
            .map(|a| a.version)
            .collect();

        let mut projection = Projection::new(self.inspector.as_ref());
        let mut planned = Vec::new();
        for migration in candidates.iter().filter(|m| !applied.contains(&m.version)) {
            let mut steps = Vec::with_capacity(migration.steps.len());
            for step in &migration.steps {
                let action = step.plan(&projection).await?;
                projection.record(step, &action);
                steps.push(PlannedStep {
                    description: step.description(),
                    statement: step.statement(),
                    action,
                });
            }
            planned.push(PlannedMigration {
                version: migration.version,
                name: migration.name.clone(),
                steps,
            });
        }
        Ok(planned)
    }

    /// 执行待执行的迁移，直到 target（含）
    ///
    /// 某个迁移失败时停止，失败的迁移不登记，已成功的保持登记
    pub async fn migrate(&self, catalog: &Catalog, target: Option<i64>) -> AppResult<RunReport> {
        let candidates = catalog.up_to(target)?;
        self.with_lock("migrate", self.run(catalog, candidates))
            .await
    }

    async fn run(
        &self,
        catalog: &Catalog,
        candidates: &[Migration],
    ) -> AppResult<RunReport> {
        self.ledger.init().await?;
        let applied = self.ledger.applied().await?;

        let drift = detect_drift(catalog, &applied);
        let blocking: Vec<&Drift> = drift.iter().filter(|d| d.is_blocking()).collect();
        if !blocking.is_empty() {
            if !self.options.allow_checksum_drift {
                let versions: Vec<String> =
                    blocking.iter().map(|d| d.version().to_string()).collect();
                return Err(AppError::failed_precondition(format!(
                    "applied migration(s) {} changed since they were applied; run `verify` for details or `repair` to accept the current definitions",
                    versions.join(", ")
                )));
            }
            for d in &blocking {
                warn!(version = d.version(), "Checksum drift ignored");
            }
        }
        for d in drift.iter().filter(|d| !d.is_blocking()) {
            warn!(version = d.version(), drift = ?d, "Ledger drift detected");
        }

        let applied_versions: HashSet<i64> = applied.iter().map(|a| a.version).collect();
        let mut report = RunReport::default();

        for migration in candidates {
            if applied_versions.contains(&migration.version) {
                report.skipped.push(migration.version);
                continue;
            }

            info!(version = migration.version, name = %migration.name, "Applying migration");
            let started = Instant::now();
            let mut steps = Vec::with_capacity(migration.steps.len());

            for (index, step) in migration.steps.iter().enumerate() {
                let description = step.description();
                match step
                    .apply(self.inspector.as_ref(), self.executor.as_ref())
                    .await
                {
                    Ok(outcome) => steps.push(StepReport {
                        description,
                        outcome,
                    }),
                    Err(e) => {
                        error!(
                            version = migration.version,
                            name = %migration.name,
                            step = index + 1,
                            error = %e,
                            "Migration failed"
                        );
                        report.failure = Some(MigrationFailure {
                            version: migration.version,
                            name: migration.name.clone(),
                            step_index: Some(index),
                            step: Some(description),
                            error: e.to_report(),
                            completed_steps: steps,
                        });
                        return Ok(report);
                    }
                }
            }

            let execution_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
            let entry = AppliedMigration {
                version: migration.version,
                name: migration.name.clone(),
                checksum: migration.checksum(),
                applied_at: Utc::now(),
                execution_ms,
                baseline: false,
            };
            if let Err(e) = self.ledger.record(&entry).await {
                error!(version = migration.version, error = %e, "Failed to record migration");
                report.failure = Some(MigrationFailure {
                    version: migration.version,
                    name: migration.name.clone(),
                    step_index: None,
                    step: None,
                    error: e.to_report(),
                    completed_steps: steps,
                });
                return Ok(report);
            }

            let applied = AppliedReport {
                version: migration.version,
                name: migration.name.clone(),
                steps,
                execution_ms,
            };
            info!(
                version = applied.version,
                name = %applied.name,
                execution_ms,
                degraded_steps = applied.degraded_steps(),
                "Migration applied"
            );
            report.applied.push(applied);
        }

        Ok(report)
    }

    /// 把 version（含）之前的迁移登记为已应用但不执行，用于接管已有数据库
    pub async fn baseline(&self, catalog: &Catalog, version: i64) -> AppResult<Vec<i64>> {
        let candidates = catalog.up_to(Some(version))?;
        self.with_lock("baseline", async {
            self.ledger.init().await?;
            let applied: HashSet<i64> = self
                .ledger
                .applied()
                .await?
                .iter()
                .map(|a| a.version)
                .collect();

            let mut recorded = Vec::new();
            for migration in candidates.iter().filter(|m| !applied.contains(&m.version)) {
                self.ledger
                    .record(&AppliedMigration {
                        version: migration.version,
                        name: migration.name.clone(),
                        checksum: migration.checksum(),
                        applied_at: Utc::now(),
                        execution_ms: 0,
                        baseline: true,
                    })
                    .await?;
                info!(version = migration.version, name = %migration.name, "Migration baselined");
                recorded.push(migration.version);
            }
            Ok(recorded)
        })
        .await
    }

    /// 用当前目录的校验和覆盖台账中不一致的记录
    pub async fn repair(&self, catalog: &Catalog) -> AppResult<Vec<i64>> {
        self.with_lock("repair", async {
            let Some(applied) = self.applied().await? else {
                return Ok(Vec::new());
            };

            let mut repaired = Vec::new();
            for drift in detect_drift(catalog, &applied) {
                match drift {
                    Drift::ChecksumMismatch {
                        version, expected, ..
                    } => {
                        self.ledger.update_checksum(version, &expected).await?;
                        info!(version, "Checksum repaired");
                        repaired.push(version);
                    }
                    Drift::UnknownVersion { version, name } => {
                        warn!(version, name = %name, "Recorded migration is not in the catalog, leaving it");
                    }
                    Drift::OutOfOrder { .. } => {}
                }
            }
            Ok(repaired)
        })
        .await
    }

    async fn with_lock<T, F>(&self, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let timeout = self.options.lock_timeout;
        if !self.lock.acquire(timeout).await? {
            return Err(AppError::conflict(format!(
                "another migration process holds the lock (waited {}s)",
                timeout.as_secs()
            )));
        }
        info!(operation, "Migration lock acquired");

        let result = fut.await;

        if let Err(e) = self.lock.release().await {
            warn!(operation, error = %e, "Failed to release migration lock");
        }
        result
    }
}

/// 对比台账与目录
pub fn detect_drift(catalog: &Catalog, applied: &[AppliedMigration]) -> Vec<Drift> {
    let mut drift = Vec::new();

    for entry in applied {
        match catalog.get(entry.version) {
            None => drift.push(Drift::UnknownVersion {
                version: entry.version,
                name: entry.name.clone(),
            }),
            Some(migration) => {
                let expected = migration.checksum();
                if entry.checksum != expected {
                    drift.push(Drift::ChecksumMismatch {
                        version: entry.version,
                        name: entry.name.clone(),
                        recorded: entry.checksum.clone(),
                        expected,
                    });
                }
            }
        }
    }

    if let Some(latest_applied) = applied.iter().map(|a| a.version).max() {
        let applied_versions: HashSet<i64> = applied.iter().map(|a| a.version).collect();
        for migration in catalog.migrations() {
            if migration.version < latest_applied && !applied_versions.contains(&migration.version) {
                drift.push(Drift::OutOfOrder {
                    version: migration.version,
                    name: migration.name.clone(),
                    latest_applied,
                });
            }
        }
    }

    drift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::PlannedAction;
    use crate::schema::{ColumnDef, ForeignKeyDef, ReferentialAction, TableDef};
    use crate::step::Step;
    use crate::testing::FakeDatabase;
    use mockall::mock;
    use nobal_ports::{ExecError, ExecErrorKind};

    mock! {
        Lock {}

        #[async_trait::async_trait]
        impl MigrationLock for Lock {
            async fn acquire(&self, timeout: Duration) -> AppResult<bool>;
            async fn release(&self) -> AppResult<()>;
            async fn is_free(&self) -> AppResult<bool>;
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Migration::new(1, "create_material_request").step(Step::create_table(
                TableDef::new("material_request")
                    .column(ColumnDef::new("mr_id", "VARCHAR(50)").not_null())
                    .primary_key(&["mr_id"]),
            )),
            Migration::new(2, "create_grn_requests").step(Step::create_table(
                TableDef::new("grn_requests")
                    .column(ColumnDef::new("grn_id", "VARCHAR(50)").not_null())
                    .primary_key(&["grn_id"]),
            )),
            Migration::new(3, "grn_department_and_mr_link")
                .step(Step::add_column(
                    "grn_requests",
                    ColumnDef::new("department", "VARCHAR(100)"),
                ))
                .step(Step::add_referencing_column(
                    "grn_requests",
                    ColumnDef::new("material_request_id", "VARCHAR(50)"),
                    ForeignKeyDef::new(
                        "fk_grn_requests_material_request",
                        "material_request_id",
                        "material_request",
                        "mr_id",
                    )
                    .on_delete(ReferentialAction::SetNull),
                )),
        ])
        .unwrap()
    }

    fn migrator(db: &Arc<FakeDatabase>) -> Migrator {
        Migrator::new(db.clone(), db.clone(), db.clone(), db.clone())
    }

    #[tokio::test]
    async fn test_migrate_then_rerun_applies_nothing() {
        let db = Arc::new(FakeDatabase::new());
        let migrator = migrator(&db);
        let catalog = catalog();

        let first = migrator.migrate(&catalog, None).await.unwrap();
        assert!(first.is_success());
        assert_eq!(first.applied_count(), 3);
        assert_eq!(db.ledger_rows().len(), 3);
        let snapshot = db.snapshot();
        let executed = db.statements().len();

        let second = migrator.migrate(&catalog, None).await.unwrap();
        assert!(second.is_success());
        assert_eq!(second.applied_count(), 0);
        assert_eq!(second.skipped, vec![1, 2, 3]);
        assert_eq!(db.snapshot(), snapshot);
        assert_eq!(db.statements().len(), executed);
        assert!(!db.lock_held());
        assert_eq!(db.lock_releases(), 2);
    }

    #[tokio::test]
    async fn test_existing_schema_without_ledger_is_adopted() {
        // 旧脚本已执行过的库：对象都在，只是没有台账
        let db = Arc::new(
            FakeDatabase::new()
                .with_table("material_request", &[("mr_id", "varchar(50)")])
                .with_table(
                    "grn_requests",
                    &[
                        ("grn_id", "varchar(50)"),
                        ("department", "varchar(100)"),
                        ("material_request_id", "varchar(50)"),
                    ],
                )
                .with_foreign_key(
                    "grn_requests",
                    "fk_grn_requests_material_request",
                    "material_request",
                ),
        );
        let report = migrator(&db).migrate(&catalog(), None).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.applied_count(), 3);
        assert!(report
            .applied
            .iter()
            .flat_map(|a| &a.steps)
            .all(|s| s.outcome == StepOutcome::AlreadyPresent));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_target_version() {
        let db = Arc::new(FakeDatabase::new());
        let migrator = migrator(&db);

        let report = migrator.migrate(&catalog(), Some(2)).await.unwrap();
        assert_eq!(report.applied_count(), 2);
        assert!(db.table("grn_requests").unwrap().column("department").is_none());

        let err = migrator.migrate(&catalog(), Some(7)).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_failure_stops_and_is_not_recorded() {
        let db = Arc::new(FakeDatabase::new().fail_when(
            "`department`",
            ExecError::new(ExecErrorKind::Other, Some(1205), "Lock wait timeout exceeded"),
        ));
        let migrator = migrator(&db);

        let report = migrator.migrate(&catalog(), None).await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.applied_count(), 2);

        let failure = report.failure.unwrap();
        assert_eq!(failure.version, 3);
        assert_eq!(failure.step_index, Some(0));
        assert!(failure.error.detail.contains("1205"));
        let versions: Vec<i64> = db.ledger_rows().iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert!(!db.lock_held());

        // 修复后重跑只执行失败的迁移
        db.clear_failures();
        let retry = migrator.migrate(&catalog(), None).await.unwrap();
        assert!(retry.is_success());
        assert_eq!(retry.skipped, vec![1, 2]);
        assert_eq!(retry.applied_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_parent_degrades() {
        let db = Arc::new(FakeDatabase::new().with_table("grn_requests", &[("grn_id", "varchar(50)")]));
        let catalog = Catalog::new(vec![Migration::new(3, "grn_mr_link").step(
            Step::add_referencing_column(
                "grn_requests",
                ColumnDef::new("material_request_id", "VARCHAR(50)"),
                ForeignKeyDef::new(
                    "fk_grn_requests_material_request",
                    "material_request_id",
                    "material_request",
                    "mr_id",
                ),
            ),
        )])
        .unwrap();

        let report = migrator(&db).migrate(&catalog, None).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.applied[0].degraded_steps(), 1);
        assert_eq!(db.ledger_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_checksum_drift_blocks_migrate() {
        let db = Arc::new(FakeDatabase::new());
        let migrator = migrator(&db);
        let catalog = catalog();
        migrator.migrate(&catalog, Some(1)).await.unwrap();
        db.update_checksum(1, "0000").await.unwrap();

        let drift = migrator.verify(&catalog).await.unwrap();
        assert_eq!(drift.len(), 1);
        assert!(matches!(drift[0], Drift::ChecksumMismatch { version: 1, .. }));

        let err = migrator.migrate(&catalog, None).await.unwrap_err();
        assert_eq!(err.kind(), "failed_precondition");
        assert!(!db.lock_held());

        let lenient = Migrator::new(db.clone(), db.clone(), db.clone(), db.clone()).with_options(
            MigratorOptions {
                allow_checksum_drift: true,
                ..MigratorOptions::default()
            },
        );
        assert!(lenient.migrate(&catalog, None).await.unwrap().is_success());

        assert_eq!(migrator.repair(&catalog).await.unwrap(), vec![1]);
        assert!(migrator.verify(&catalog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_and_unknown_versions() {
        let db = Arc::new(FakeDatabase::new());
        let migrator = migrator(&db);
        let catalog = catalog();

        let before = migrator.status(&catalog).await.unwrap();
        assert!(!before.ledger_exists);
        assert_eq!(before.pending_count(), 3);
        assert!(!db.exists().await.unwrap());

        migrator.migrate(&catalog, Some(1)).await.unwrap();
        db.record(&AppliedMigration {
            version: 99,
            name: "removed_migration".to_string(),
            checksum: "abc".to_string(),
            applied_at: Utc::now(),
            execution_ms: 1,
            baseline: false,
        })
        .await
        .unwrap();

        let after = migrator.status(&catalog).await.unwrap();
        assert!(after.ledger_exists);
        assert_eq!(after.pending_count(), 2);
        assert!(matches!(
            after.migrations[0].state,
            MigrationState::Applied { baseline: false, .. }
        ));
        assert_eq!(after.unknown.len(), 1);

        let drift = migrator.verify(&catalog).await.unwrap();
        assert!(drift.contains(&Drift::UnknownVersion {
            version: 99,
            name: "removed_migration".to_string()
        }));
        assert!(drift.iter().any(|d| matches!(d, Drift::OutOfOrder { version: 2, .. })));
    }

    #[tokio::test]
    async fn test_plan_executes_nothing() {
        let db = Arc::new(FakeDatabase::new());
        let migrator = migrator(&db);

        let plan = migrator.plan(&catalog(), None).await.unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|m| !m.will_fail()));
        assert!(plan
            .iter()
            .flat_map(|m| &m.steps)
            .all(|s| s.action == PlannedAction::WillApply));
        assert!(db.statements().is_empty());
        assert!(!db.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_baseline_records_without_executing() {
        let db = Arc::new(FakeDatabase::new());
        let migrator = migrator(&db);

        assert_eq!(migrator.baseline(&catalog(), 2).await.unwrap(), vec![1, 2]);
        assert!(db.statements().is_empty());
        assert!(db.ledger_rows().iter().all(|r| r.baseline));

        // 已登记的版本不重复登记
        assert_eq!(migrator.baseline(&catalog(), 2).await.unwrap(), Vec::<i64>::new());
        assert_eq!(migrator.plan(&catalog(), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lock_held_elsewhere() {
        let db = Arc::new(FakeDatabase::new().hold_lock_elsewhere());
        let err = migrator(&db).migrate(&catalog(), None).await.unwrap_err();

        assert_eq!(err.kind(), "conflict");
        assert!(!db.exists().await.unwrap());
        assert_eq!(db.lock_releases(), 0);
    }

    #[tokio::test]
    async fn test_lock_released_once_on_error() {
        let db = Arc::new(FakeDatabase::new());
        let catalog = catalog();
        Migrator::new(db.clone(), db.clone(), db.clone(), db.clone())
            .migrate(&catalog, Some(1))
            .await
            .unwrap();
        db.update_checksum(1, "0000").await.unwrap();

        let mut lock = MockLock::new();
        lock.expect_acquire().times(1).returning(|_| Ok(true));
        lock.expect_release().times(1).returning(|| Ok(()));

        let migrator = Migrator::new(db.clone(), db.clone(), db.clone(), Arc::new(lock));
        assert!(migrator.migrate(&catalog, None).await.is_err());
    }
}

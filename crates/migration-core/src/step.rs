//! 迁移步骤
//!
//! 每个步骤先查询 schema 判断目标状态是否已满足，再执行 DDL；
//! 执行时遇到重复对象错误同样视为已满足，父表缺失时跳过外键继续执行

use nobal_common::validate_identifier;
use nobal_errors::{AppError, AppResult};
use nobal_ports::{ExecError, ExecErrorKind, SchemaInspector, StatementExecutor};
use tracing::{debug, warn};

use crate::render;
use crate::report::{PlannedAction, StepOutcome};
use crate::schema::{ColumnDef, ForeignKeyDef, IndexDef, TableDef};

/// 迁移步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// 建表，表已存在时跳过
    CreateTable(TableDef),
    /// 新增列
    AddColumn { table: String, column: ColumnDef },
    /// 新增列并建立外键
    AddReferencingColumn {
        table: String,
        column: ColumnDef,
        foreign_key: ForeignKeyDef,
    },
    /// 修改列类型或可空性，当前定义一致时跳过
    ModifyColumn { table: String, column: ColumnDef },
    CreateIndex { table: String, index: IndexDef },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyDef,
    },
    DropForeignKey { table: String, name: String },
    /// 原样执行的语句（数据回填等），每次都执行，语句本身必须可重复执行
    Execute {
        description: String,
        statement: String,
    },
}

/// 查询 schema 后得出的处理方式
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Present,
    Run {
        statement: String,
        degraded: Option<String>,
    },
    /// 无法执行但不算失败（父表缺失时跳过外键）
    Skip { reason: String },
    Fail { reason: String },
}

impl Step {
    pub fn create_table(table: TableDef) -> Self {
        Self::CreateTable(table)
    }

    pub fn add_column(table: impl Into<String>, column: ColumnDef) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    pub fn add_referencing_column(
        table: impl Into<String>,
        column: ColumnDef,
        foreign_key: ForeignKeyDef,
    ) -> Self {
        Self::AddReferencingColumn {
            table: table.into(),
            column,
            foreign_key,
        }
    }

    pub fn modify_column(table: impl Into<String>, column: ColumnDef) -> Self {
        Self::ModifyColumn {
            table: table.into(),
            column,
        }
    }

    pub fn create_index(table: impl Into<String>, index: IndexDef) -> Self {
        Self::CreateIndex {
            table: table.into(),
            index,
        }
    }

    pub fn add_foreign_key(table: impl Into<String>, foreign_key: ForeignKeyDef) -> Self {
        Self::AddForeignKey {
            table: table.into(),
            foreign_key,
        }
    }

    pub fn drop_foreign_key(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropForeignKey {
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn execute(description: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::Execute {
            description: description.into(),
            statement: statement.into(),
        }
    }

    /// 目标表
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable(table) => Some(&table.name),
            Self::AddColumn { table, .. }
            | Self::AddReferencingColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. } => Some(table),
            Self::Execute { .. } => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::CreateTable(table) => format!("create table `{}`", table.name),
            Self::AddColumn { table, column } => {
                format!("add column `{}`.`{}`", table, column.name)
            }
            Self::AddReferencingColumn {
                table,
                column,
                foreign_key,
            } => format!(
                "add column `{}`.`{}` with foreign key `{}`",
                table, column.name, foreign_key.name
            ),
            Self::ModifyColumn { table, column } => {
                format!("modify column `{}`.`{}`", table, column.name)
            }
            Self::CreateIndex { table, index } => {
                format!("create index `{}` on `{}`", index.name, table)
            }
            Self::AddForeignKey { table, foreign_key } => {
                format!("add foreign key `{}` on `{}`", foreign_key.name, table)
            }
            Self::DropForeignKey { table, name } => {
                format!("drop foreign key `{}` on `{}`", name, table)
            }
            Self::Execute { description, .. } => description.clone(),
        }
    }

    /// 完整形态下的 SQL，用于计算校验和与展示
    pub fn statement(&self) -> String {
        match self {
            Self::CreateTable(table) => render::create_table(table, true),
            Self::AddColumn { table, column } => render::add_column(table, column),
            Self::AddReferencingColumn {
                table,
                column,
                foreign_key,
            } => render::add_column_with_foreign_key(table, column, foreign_key),
            Self::ModifyColumn { table, column } => render::modify_column(table, column),
            Self::CreateIndex { table, index } => render::create_index(table, index),
            Self::AddForeignKey { table, foreign_key } => {
                render::add_foreign_key(table, foreign_key)
            }
            Self::DropForeignKey { table, name } => render::drop_foreign_key(table, name),
            Self::Execute { statement, .. } => statement.clone(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::CreateTable(table) => table.validate(),
            Self::AddColumn { table, column } | Self::ModifyColumn { table, column } => {
                validate_identifier(table)?;
                column.validate()
            }
            Self::AddReferencingColumn {
                table,
                column,
                foreign_key,
            } => {
                validate_identifier(table)?;
                column.validate()?;
                foreign_key.validate()?;
                if foreign_key.columns != [column.name.clone()] {
                    return Err(AppError::validation(format!(
                        "foreign key `{}` must reference only the new column `{}`",
                        foreign_key.name, column.name
                    )));
                }
                Ok(())
            }
            Self::CreateIndex { table, index } => {
                validate_identifier(table)?;
                index.validate()
            }
            Self::AddForeignKey { table, foreign_key } => {
                validate_identifier(table)?;
                foreign_key.validate()
            }
            Self::DropForeignKey { table, name } => {
                validate_identifier(table)?;
                validate_identifier(name)
            }
            Self::Execute {
                description,
                statement,
            } => {
                if description.trim().is_empty() || statement.trim().is_empty() {
                    return Err(AppError::validation(
                        "execute step needs a description and a statement",
                    ));
                }
                Ok(())
            }
        }
    }

    /// 只查询不执行，判断此步骤会如何处理
    pub async fn plan(&self, inspector: &dyn SchemaInspector) -> AppResult<PlannedAction> {
        Ok(match self.resolve(inspector).await? {
            Resolution::Present => PlannedAction::AlreadyPresent,
            Resolution::Run {
                degraded: None, ..
            } => PlannedAction::WillApply,
            Resolution::Run {
                degraded: Some(reason),
                ..
            }
            | Resolution::Skip { reason } => PlannedAction::WillDegrade { reason },
            Resolution::Fail { reason } => PlannedAction::WillFail { reason },
        })
    }

    /// 执行步骤
    pub async fn apply(
        &self,
        inspector: &dyn SchemaInspector,
        executor: &dyn StatementExecutor,
    ) -> AppResult<StepOutcome> {
        let description = self.description();

        let (statement, degraded) = match self.resolve(inspector).await? {
            Resolution::Present => {
                debug!(step = %description, "Already present, skipping");
                return Ok(StepOutcome::AlreadyPresent);
            }
            Resolution::Skip { reason } => {
                warn!(step = %description, reason = %reason, "Skipping step");
                return Ok(StepOutcome::Degraded { reason });
            }
            Resolution::Fail { reason } => {
                return Err(AppError::failed_precondition(format!(
                    "{}: {}",
                    description, reason
                )));
            }
            Resolution::Run {
                statement,
                degraded,
            } => (statement, degraded),
        };

        match executor.execute(&statement).await {
            Ok(rows_affected) => Ok(match degraded {
                Some(reason) => {
                    warn!(step = %description, reason = %reason, "Applied without foreign key");
                    StepOutcome::Degraded { reason }
                }
                None => StepOutcome::Applied { rows_affected },
            }),
            Err(err) => self.recover(&description, &statement, executor, err).await,
        }
    }

    /// 执行失败后按错误分类处理
    async fn recover(
        &self,
        description: &str,
        statement: &str,
        executor: &dyn StatementExecutor,
        err: ExecError,
    ) -> AppResult<StepOutcome> {
        if err.kind.is_duplicate() {
            warn!(step = %description, kind = %err.kind, code = ?err.code, error = %err, "Object already exists, treating as applied");
            return Ok(StepOutcome::AlreadyPresent);
        }

        match (self, err.kind) {
            (Self::DropForeignKey { .. }, ExecErrorKind::MissingObject) => {
                warn!(step = %description, "Foreign key already gone");
                Ok(StepOutcome::AlreadyPresent)
            }
            (Self::CreateTable(table), ExecErrorKind::MissingReferencedTable) => {
                let reason = format!("referenced table missing ({})", err);
                warn!(step = %description, reason = %reason, "Retrying without foreign keys");
                executor
                    .execute(&render::create_table(table, false))
                    .await
                    .map_err(|e| statement_failed(description, &e))?;
                Ok(StepOutcome::Degraded { reason })
            }
            (
                Self::AddReferencingColumn {
                    table,
                    column,
                    foreign_key,
                },
                ExecErrorKind::MissingReferencedTable,
            ) => {
                let reason = format!("referenced table missing ({})", err);
                // 列已存在时只执行了 ADD CONSTRAINT，外键缺失即降级
                if statement == render::add_foreign_key(table, foreign_key) {
                    warn!(step = %description, reason = %reason, "Skipping foreign key");
                    return Ok(StepOutcome::Degraded { reason });
                }
                warn!(step = %description, reason = %reason, "Retrying without foreign key");
                match executor.execute(&render::add_column(table, column)).await {
                    Ok(_) => Ok(StepOutcome::Degraded { reason }),
                    Err(e) if e.kind.is_duplicate() => Ok(StepOutcome::AlreadyPresent),
                    Err(e) => Err(statement_failed(description, &e)),
                }
            }
            (Self::AddForeignKey { .. }, ExecErrorKind::MissingReferencedTable) => {
                let reason = format!("referenced table missing ({})", err);
                warn!(step = %description, reason = %reason, "Skipping foreign key");
                Ok(StepOutcome::Degraded { reason })
            }
            _ => Err(statement_failed(description, &err)),
        }
    }

    async fn resolve(&self, inspector: &dyn SchemaInspector) -> AppResult<Resolution> {
        if let Some(table) = self.table() {
            let exists = inspector.table_exists(table).await?;
            match self {
                Self::CreateTable(_) if exists => return Ok(Resolution::Present),
                Self::CreateTable(_) => {}
                _ if !exists => {
                    return Ok(Resolution::Fail {
                        reason: format!("table `{}` does not exist", table),
                    });
                }
                _ => {}
            }
        }

        let resolution = match self {
            Self::CreateTable(table) => {
                let mut missing = Vec::new();
                for referenced in table.referenced_tables() {
                    if !inspector.table_exists(referenced).await? {
                        missing.push(format!("`{}`", referenced));
                    }
                }
                if missing.is_empty() {
                    run(render::create_table(table, true))
                } else {
                    Resolution::Run {
                        statement: render::create_table(table, false),
                        degraded: Some(format!(
                            "referenced table {} missing, creating without foreign keys",
                            missing.join(", ")
                        )),
                    }
                }
            }
            Self::AddColumn { table, column } => {
                if inspector.column(table, &column.name).await?.is_some() {
                    Resolution::Present
                } else if let Some(reason) = missing_anchor(inspector, table, column).await? {
                    Resolution::Fail { reason }
                } else {
                    run(render::add_column(table, column))
                }
            }
            Self::AddReferencingColumn {
                table,
                column,
                foreign_key,
            } => {
                let column_exists = inspector.column(table, &column.name).await?.is_some();
                let fk_exists = column_exists
                    && inspector.foreign_key_exists(table, &foreign_key.name).await?;
                let parent_exists = inspector
                    .table_exists(&foreign_key.referenced_table)
                    .await?;

                match (column_exists, fk_exists, parent_exists) {
                    (true, true, _) => Resolution::Present,
                    (true, false, true) => run(render::add_foreign_key(table, foreign_key)),
                    (true, false, false) => Resolution::Skip {
                        reason: parent_missing(foreign_key),
                    },
                    (false, _, parent_exists) => {
                        if let Some(reason) = missing_anchor(inspector, table, column).await? {
                            Resolution::Fail { reason }
                        } else if parent_exists {
                            run(render::add_column_with_foreign_key(
                                table,
                                column,
                                foreign_key,
                            ))
                        } else {
                            Resolution::Run {
                                statement: render::add_column(table, column),
                                degraded: Some(parent_missing(foreign_key)),
                            }
                        }
                    }
                }
            }
            Self::ModifyColumn { table, column } => match inspector.column(table, &column.name).await? {
                None => Resolution::Fail {
                    reason: format!("column `{}`.`{}` does not exist", table, column.name),
                },
                Some(current)
                    if current.nullable == column.nullable
                        && render::normalize_column_type(&current.column_type)
                            == render::normalize_column_type(&column.sql_type) =>
                {
                    Resolution::Present
                }
                Some(_) => run(render::modify_column(table, column)),
            },
            Self::CreateIndex { table, index } => {
                if inspector.index_exists(table, &index.name).await? {
                    Resolution::Present
                } else {
                    run(render::create_index(table, index))
                }
            }
            Self::AddForeignKey { table, foreign_key } => {
                if inspector.foreign_key_exists(table, &foreign_key.name).await? {
                    Resolution::Present
                } else if !inspector
                    .table_exists(&foreign_key.referenced_table)
                    .await?
                {
                    Resolution::Skip {
                        reason: parent_missing(foreign_key),
                    }
                } else {
                    run(render::add_foreign_key(table, foreign_key))
                }
            }
            Self::DropForeignKey { table, name } => {
                if inspector.foreign_key_exists(table, name).await? {
                    run(render::drop_foreign_key(table, name))
                } else {
                    Resolution::Present
                }
            }
            Self::Execute { statement, .. } => run(statement.clone()),
        };

        Ok(resolution)
    }
}

fn run(statement: String) -> Resolution {
    Resolution::Run {
        statement,
        degraded: None,
    }
}

fn parent_missing(foreign_key: &ForeignKeyDef) -> String {
    format!(
        "referenced table `{}` missing, foreign key `{}` skipped",
        foreign_key.referenced_table, foreign_key.name
    )
}

/// AFTER 指定的列不存在时返回原因
async fn missing_anchor(
    inspector: &dyn SchemaInspector,
    table: &str,
    column: &ColumnDef,
) -> AppResult<Option<String>> {
    let Some(after) = &column.after else {
        return Ok(None);
    };
    if inspector.column(table, after).await?.is_some() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "column `{}`.`{}` referenced by AFTER does not exist",
            table, after
        )))
    }
}

fn statement_failed(description: &str, err: &ExecError) -> AppError {
    match err.code {
        Some(code) => AppError::database(format!(
            "{} failed (MySQL error {}): {}",
            description, code, err
        )),
        None => AppError::database(format!("{} failed: {}", description, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReferentialAction;
    use crate::testing::FakeDatabase;

    fn grn_fk() -> ForeignKeyDef {
        ForeignKeyDef::new(
            "fk_grn_requests_material_request",
            "material_request_id",
            "material_request",
            "mr_id",
        )
        .on_delete(ReferentialAction::SetNull)
    }

    #[tokio::test]
    async fn test_add_column_is_idempotent() {
        let db = FakeDatabase::new().with_table("grn_requests", &[("grn_id", "varchar(50)")]);
        let step = Step::add_column("grn_requests", ColumnDef::new("department", "VARCHAR(100)"));

        assert_eq!(step.plan(&db).await.unwrap(), PlannedAction::WillApply);
        let first = step.apply(&db, &db).await.unwrap();
        assert!(matches!(first, StepOutcome::Applied { .. }));

        assert_eq!(step.plan(&db).await.unwrap(), PlannedAction::AlreadyPresent);
        let second = step.apply(&db, &db).await.unwrap();
        assert_eq!(second, StepOutcome::AlreadyPresent);
        assert_eq!(db.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_fails() {
        let db = FakeDatabase::new();
        let step = Step::add_column("workstation", ColumnDef::new("hour_rate", "DECIMAL(18,2)"));

        assert!(matches!(
            step.plan(&db).await.unwrap(),
            PlannedAction::WillFail { .. }
        ));
        let err = step.apply(&db, &db).await.unwrap_err();
        assert_eq!(err.kind(), "failed_precondition");
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_error_treated_as_present() {
        let db = FakeDatabase::new()
            .with_table("bom", &[("bom_id", "varchar(50)")])
            .fail_when(
                "ADD COLUMN `revision`",
                ExecError::new(ExecErrorKind::DuplicateColumn, Some(1060), "Duplicate column name 'revision'"),
            );
        let step = Step::add_column("bom", ColumnDef::new("revision", "INT"));

        assert_eq!(step.apply(&db, &db).await.unwrap(), StepOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn test_referencing_column_degrades_without_parent() {
        let db = FakeDatabase::new().with_table("grn_requests", &[("grn_id", "varchar(50)")]);
        let step = Step::add_referencing_column(
            "grn_requests",
            ColumnDef::new("material_request_id", "VARCHAR(50)"),
            grn_fk(),
        );

        assert!(matches!(
            step.plan(&db).await.unwrap(),
            PlannedAction::WillDegrade { .. }
        ));
        let outcome = step.apply(&db, &db).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Degraded { .. }));

        let table = db.table("grn_requests").unwrap();
        assert!(table.column("material_request_id").is_some());
        assert!(table.foreign_keys.is_empty());
    }

    #[tokio::test]
    async fn test_referencing_column_adds_missing_fk_later() {
        let db = FakeDatabase::new()
            .with_table("grn_requests", &[("grn_id", "varchar(50)"), ("material_request_id", "varchar(50)")])
            .with_table("material_request", &[("mr_id", "varchar(50)")]);
        let step = Step::add_referencing_column(
            "grn_requests",
            ColumnDef::new("material_request_id", "VARCHAR(50)"),
            grn_fk(),
        );

        assert!(matches!(
            step.apply(&db, &db).await.unwrap(),
            StepOutcome::Applied { .. }
        ));
        assert!(db.statements()[0].starts_with("ALTER TABLE `grn_requests` ADD CONSTRAINT"));
        assert!(db
            .table("grn_requests")
            .unwrap()
            .foreign_keys
            .contains_key("fk_grn_requests_material_request"));
    }

    #[tokio::test]
    async fn test_existing_column_fk_rejected_is_degraded() {
        // 列和父表都在，ADD CONSTRAINT 执行时报父表缺失
        let db = FakeDatabase::new()
            .with_table("grn_requests", &[("grn_id", "varchar(50)"), ("material_request_id", "varchar(50)")])
            .with_table("material_request", &[("mr_id", "varchar(50)")])
            .fail_when(
                "ADD CONSTRAINT",
                ExecError::new(ExecErrorKind::MissingReferencedTable, Some(1824), "Failed to open the referenced table 'material_request'"),
            );
        let step = Step::add_referencing_column(
            "grn_requests",
            ColumnDef::new("material_request_id", "VARCHAR(50)"),
            grn_fk(),
        );

        let outcome = step.apply(&db, &db).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Degraded { .. }));
        // 不再补执行 ADD COLUMN
        assert_eq!(db.statements().len(), 1);
        assert!(db.table("grn_requests").unwrap().foreign_keys.is_empty());
    }

    #[tokio::test]
    async fn test_create_table_retries_without_foreign_keys() {
        // 查询时父表存在，执行时报父表缺失
        let db = FakeDatabase::new()
            .with_table("bom", &[("bom_id", "varchar(50)")])
            .fail_when(
                "CONSTRAINT `fk_bom_line_bom`",
                ExecError::new(ExecErrorKind::MissingReferencedTable, Some(1824), "Failed to open the referenced table 'bom'"),
            );
        let table = TableDef::new("bom_line")
            .column(ColumnDef::new("line_id", "INT").auto_increment())
            .column(ColumnDef::new("bom_id", "VARCHAR(50)").not_null())
            .primary_key(&["line_id"])
            .foreign_key(ForeignKeyDef::new("fk_bom_line_bom", "bom_id", "bom", "bom_id"));
        let step = Step::create_table(table);

        assert!(matches!(
            step.apply(&db, &db).await.unwrap(),
            StepOutcome::Degraded { .. }
        ));
        assert_eq!(db.statements().len(), 2);
        assert!(db.table("bom_line").is_some());
    }

    #[tokio::test]
    async fn test_modify_column_compares_normalized_type() {
        let db = FakeDatabase::new().with_table(
            "stock_ledger",
            &[("transaction_type", "enum('Purchase Receipt','Issue')")],
        );
        let same = Step::modify_column(
            "stock_ledger",
            ColumnDef::enumeration("transaction_type", &["Purchase Receipt", "Issue"]),
        );
        assert_eq!(same.plan(&db).await.unwrap(), PlannedAction::AlreadyPresent);

        let widened = Step::modify_column(
            "stock_ledger",
            ColumnDef::enumeration("transaction_type", &["Purchase Receipt", "Issue", "Transfer"]),
        );
        assert_eq!(widened.plan(&db).await.unwrap(), PlannedAction::WillApply);
        widened.apply(&db, &db).await.unwrap();
        assert_eq!(widened.plan(&db).await.unwrap(), PlannedAction::AlreadyPresent);

        let not_null = Step::modify_column(
            "stock_ledger",
            ColumnDef::enumeration("transaction_type", &["Purchase Receipt", "Issue", "Transfer"]).not_null(),
        );
        assert_eq!(not_null.plan(&db).await.unwrap(), PlannedAction::WillApply);
    }

    #[tokio::test]
    async fn test_drop_foreign_key_when_absent() {
        let db = FakeDatabase::new().with_table("selling_sales_order", &[("sales_order_id", "varchar(50)")]);
        let step = Step::drop_foreign_key("selling_sales_order", "selling_sales_order_ibfk_1");

        assert_eq!(step.apply(&db, &db).await.unwrap(), StepOutcome::AlreadyPresent);
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_other_error_is_database_error() {
        let db = FakeDatabase::new().fail_when(
            "UPDATE",
            ExecError::new(ExecErrorKind::Other, Some(1205), "Lock wait timeout exceeded"),
        );
        let step = Step::execute("backfill item_code", "UPDATE `stock_balance` SET `item_code` = 'UNKNOWN'");

        let err = step.apply(&db, &db).await.unwrap_err();
        assert_eq!(err.kind(), "database");
        assert!(err.to_string().contains("1205"));
    }

    #[test]
    fn test_validate() {
        assert!(Step::execute("", "SELECT 1").validate().is_err());
        assert!(Step::drop_foreign_key("bad name", "fk").validate().is_err());

        let mismatched = Step::add_referencing_column(
            "grn_requests",
            ColumnDef::new("other_id", "VARCHAR(50)"),
            grn_fk(),
        );
        assert!(mismatched.validate().is_err());
    }
}

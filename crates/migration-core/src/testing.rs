//! 内存版假数据库
//!
//! 同时实现四个 port，解析本 crate 渲染出的 DDL 并维护表结构，
//! 用于在没有 MySQL 的情况下测试迁移引擎和迁移目录

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use nobal_errors::{AppError, AppResult};
use nobal_ports::{
    AppliedMigration, ColumnInfo, ExecError, ExecErrorKind, MigrationLedger, MigrationLock,
    SchemaInspector, StatementExecutor,
};

/// 假数据库中的一张表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeTable {
    pub columns: Vec<ColumnInfo>,
    pub indexes: BTreeSet<String>,
    /// 约束名 -> 父表
    pub foreign_keys: BTreeMap<String, String>,
}

impl FakeTable {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, FakeTable>,
    statements: Vec<String>,
    failures: Vec<(String, ExecError)>,
    ledger: Option<BTreeMap<i64, AppliedMigration>>,
    lock_held: bool,
    lock_held_elsewhere: bool,
    lock_releases: usize,
}

#[derive(Debug, Default)]
pub struct FakeDatabase {
    state: Mutex<State>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一张表，列均可空
    pub fn with_table(self, name: &str, columns: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state();
            let table = state.tables.entry(name.to_string()).or_default();
            for (column, column_type) in columns {
                table.columns.push(ColumnInfo {
                    name: column.to_string(),
                    column_type: column_type.to_string(),
                    nullable: true,
                    default: None,
                });
            }
        }
        self
    }

    /// 预置外键
    pub fn with_foreign_key(self, table: &str, name: &str, referenced_table: &str) -> Self {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .foreign_keys
            .insert(name.to_string(), referenced_table.to_string());
        self
    }

    /// 语句包含 `needle` 时返回指定错误
    pub fn fail_when(self, needle: &str, error: ExecError) -> Self {
        self.state().failures.push((needle.to_string(), error));
        self
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// 模拟另一个进程持有迁移锁
    pub fn hold_lock_elsewhere(self) -> Self {
        self.state().lock_held_elsewhere = true;
        self
    }

    /// 所有收到的语句（包括失败的）
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn snapshot(&self) -> BTreeMap<String, FakeTable> {
        self.state().tables.clone()
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.state().tables.get(name).cloned()
    }

    pub fn ledger_rows(&self) -> Vec<AppliedMigration> {
        self.state()
            .ledger
            .as_ref()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 删除台账表，schema 保持不变
    pub fn forget_ledger(&self) {
        self.state().ledger = None;
    }

    pub fn lock_held(&self) -> bool {
        self.state().lock_held
    }

    pub fn lock_releases(&self) -> usize {
        self.state().lock_releases
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SchemaInspector for FakeDatabase {
    async fn table_exists(&self, table: &str) -> AppResult<bool> {
        Ok(self.state().tables.contains_key(table))
    }

    async fn column(&self, table: &str, column: &str) -> AppResult<Option<ColumnInfo>> {
        Ok(self
            .state()
            .tables
            .get(table)
            .and_then(|t| t.column(column).cloned()))
    }

    async fn index_exists(&self, table: &str, index: &str) -> AppResult<bool> {
        Ok(self
            .state()
            .tables
            .get(table)
            .is_some_and(|t| t.indexes.contains(index)))
    }

    async fn foreign_key_exists(&self, table: &str, constraint: &str) -> AppResult<bool> {
        Ok(self
            .state()
            .tables
            .get(table)
            .is_some_and(|t| t.foreign_keys.contains_key(constraint)))
    }
}

#[async_trait]
impl StatementExecutor for FakeDatabase {
    async fn execute(&self, statement: &str) -> Result<u64, ExecError> {
        let mut state = self.state();
        state.statements.push(statement.to_string());

        if let Some((_, error)) = state
            .failures
            .iter()
            .find(|(needle, _)| statement.contains(needle.as_str()))
        {
            return Err(error.clone());
        }

        apply_statement(&mut state.tables, statement)
    }
}

#[async_trait]
impl MigrationLedger for FakeDatabase {
    async fn init(&self) -> AppResult<()> {
        self.state().ledger.get_or_insert_with(BTreeMap::new);
        Ok(())
    }

    async fn exists(&self) -> AppResult<bool> {
        Ok(self.state().ledger.is_some())
    }

    async fn applied(&self) -> AppResult<Vec<AppliedMigration>> {
        match &self.state().ledger {
            Some(rows) => Ok(rows.values().cloned().collect()),
            None => Err(AppError::database("ledger table does not exist")),
        }
    }

    async fn record(&self, entry: &AppliedMigration) -> AppResult<()> {
        let mut state = self.state();
        let rows = state
            .ledger
            .as_mut()
            .ok_or_else(|| AppError::database("ledger table does not exist"))?;
        if rows.contains_key(&entry.version) {
            return Err(AppError::conflict(format!(
                "migration {} is already recorded",
                entry.version
            )));
        }
        rows.insert(entry.version, entry.clone());
        Ok(())
    }

    async fn update_checksum(&self, version: i64, checksum: &str) -> AppResult<()> {
        let mut state = self.state();
        let row = state
            .ledger
            .as_mut()
            .and_then(|rows| rows.get_mut(&version))
            .ok_or_else(|| AppError::not_found(format!("migration {} is not recorded", version)))?;
        row.checksum = checksum.to_string();
        Ok(())
    }
}

#[async_trait]
impl MigrationLock for FakeDatabase {
    async fn acquire(&self, _timeout: Duration) -> AppResult<bool> {
        let mut state = self.state();
        if state.lock_held_elsewhere {
            return Ok(false);
        }
        state.lock_held = true;
        Ok(true)
    }

    async fn release(&self) -> AppResult<()> {
        let mut state = self.state();
        state.lock_held = false;
        state.lock_releases += 1;
        Ok(())
    }

    async fn is_free(&self) -> AppResult<bool> {
        let state = self.state();
        Ok(!state.lock_held && !state.lock_held_elsewhere)
    }
}

fn exec_err(kind: ExecErrorKind, code: u16, message: String) -> ExecError {
    ExecError::new(kind, Some(code), message)
}

fn unparsed(statement: &str) -> ExecError {
    ExecError::other(format!("fake database cannot parse: {}", statement))
}

/// 解析开头的反引号标识符，返回标识符和剩余部分
fn take_ident(input: &str) -> Option<(String, &str)> {
    let rest = input.trim_start().strip_prefix('`')?;
    let mut ident = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '`' {
            if let Some((_, '`')) = chars.peek() {
                ident.push('`');
                chars.next();
                continue;
            }
            return Some((ident, &rest[idx + 1..]));
        }
        ident.push(c);
    }
    None
}

/// `` `a`, `b` `` 括号内的列名
fn take_ident_list(input: &str) -> Option<(Vec<String>, &str)> {
    let rest = input.trim_start().strip_prefix('(')?;
    let end = rest.find(')')?;
    let mut names = Vec::new();
    let mut inner = &rest[..end];
    while let Some((name, tail)) = take_ident(inner) {
        names.push(name);
        inner = tail.trim_start().trim_start_matches(',');
    }
    Some((names, &rest[end + 1..]))
}

/// 解析列定义：`` `name` TYPE NULL|NOT NULL [DEFAULT ...] [AFTER `x`] ``
fn parse_column(definition: &str) -> Option<(ColumnInfo, Option<String>)> {
    let (name, rest) = take_ident(definition)?;
    let (rest, after) = match rest.rsplit_once(" AFTER ") {
        Some((head, tail)) => (head, Some(take_ident(tail)?.0)),
        None => (rest, None),
    };
    let rest = rest.trim();
    let (column_type, nullable, tail) = match rest.find(" NOT NULL") {
        Some(idx) => (&rest[..idx], false, &rest[idx + " NOT NULL".len()..]),
        None => {
            let idx = rest.find(" NULL")?;
            (&rest[..idx], true, &rest[idx + " NULL".len()..])
        }
    };
    let default = tail
        .split_once(" DEFAULT ")
        .map(|(_, value)| value.trim().to_string());

    Some((
        ColumnInfo {
            name,
            column_type: column_type.trim().to_string(),
            nullable,
            default,
        },
        after,
    ))
}

/// 解析 `` CONSTRAINT `fk` FOREIGN KEY (`c`) REFERENCES `parent` (...) ``
fn parse_constraint(clause: &str) -> Option<(String, String)> {
    let rest = clause.trim_start().strip_prefix("CONSTRAINT")?;
    let (name, rest) = take_ident(rest)?;
    let rest = rest.trim_start().strip_prefix("FOREIGN KEY")?;
    let (_, rest) = take_ident_list(rest)?;
    let rest = rest.trim_start().strip_prefix("REFERENCES")?;
    let (parent, _) = take_ident(rest)?;
    Some((name, parent))
}

fn check_constraint(
    tables: &BTreeMap<String, FakeTable>,
    table: &str,
    name: &str,
    parent: &str,
) -> Result<(), ExecError> {
    if parent != table && !tables.contains_key(parent) {
        return Err(exec_err(
            ExecErrorKind::MissingReferencedTable,
            1824,
            format!("Failed to open the referenced table '{}'", parent),
        ));
    }
    if tables
        .values()
        .any(|t| t.foreign_keys.contains_key(name))
    {
        return Err(exec_err(
            ExecErrorKind::DuplicateForeignKey,
            1826,
            format!("Duplicate foreign key constraint name '{}'", name),
        ));
    }
    Ok(())
}

fn apply_statement(
    tables: &mut BTreeMap<String, FakeTable>,
    statement: &str,
) -> Result<u64, ExecError> {
    if let Some(rest) = statement.strip_prefix("CREATE TABLE ") {
        return create_table(tables, statement, rest);
    }
    if let Some(rest) = statement.strip_prefix("ALTER TABLE ") {
        return alter_table(tables, statement, rest);
    }
    let index_rest = statement
        .strip_prefix("CREATE UNIQUE INDEX ")
        .or_else(|| statement.strip_prefix("CREATE INDEX "));
    if let Some(rest) = index_rest {
        let (index, rest) = take_ident(rest).ok_or_else(|| unparsed(statement))?;
        let rest = rest.trim_start().strip_prefix("ON").ok_or_else(|| unparsed(statement))?;
        let (table, _) = take_ident(rest).ok_or_else(|| unparsed(statement))?;
        let target = tables.get_mut(&table).ok_or_else(|| missing_table(&table))?;
        if !target.indexes.insert(index.clone()) {
            return Err(exec_err(
                ExecErrorKind::DuplicateKey,
                1061,
                format!("Duplicate key name '{}'", index),
            ));
        }
        return Ok(0);
    }
    Ok(0)
}

fn missing_table(table: &str) -> ExecError {
    exec_err(
        ExecErrorKind::MissingTable,
        1146,
        format!("Table '{}' doesn't exist", table),
    )
}

fn create_table(
    tables: &mut BTreeMap<String, FakeTable>,
    statement: &str,
    rest: &str,
) -> Result<u64, ExecError> {
    let (name, _) = take_ident(rest).ok_or_else(|| unparsed(statement))?;
    if tables.contains_key(&name) {
        return Err(exec_err(
            ExecErrorKind::TableExists,
            1050,
            format!("Table '{}' already exists", name),
        ));
    }

    let mut table = FakeTable::default();
    for line in statement.lines().skip(1) {
        let line = line.trim().trim_end_matches(',');
        if line.starts_with(')') {
            break;
        }
        if line.starts_with('`') {
            let (column, _) = parse_column(line).ok_or_else(|| unparsed(statement))?;
            table.columns.push(column);
        } else if line.starts_with("PRIMARY KEY") {
            table.indexes.insert("PRIMARY".to_string());
        } else if let Some(key) = line
            .strip_prefix("UNIQUE KEY")
            .or_else(|| line.strip_prefix("KEY"))
        {
            let (index, _) = take_ident(key).ok_or_else(|| unparsed(statement))?;
            table.indexes.insert(index);
        } else if line.starts_with("CONSTRAINT") {
            let (fk, parent) = parse_constraint(line).ok_or_else(|| unparsed(statement))?;
            check_constraint(tables, &name, &fk, &parent)?;
            table.foreign_keys.insert(fk, parent);
        } else {
            return Err(unparsed(statement));
        }
    }

    tables.insert(name, table);
    Ok(0)
}

fn alter_table(
    tables: &mut BTreeMap<String, FakeTable>,
    statement: &str,
    rest: &str,
) -> Result<u64, ExecError> {
    let (name, rest) = take_ident(rest).ok_or_else(|| unparsed(statement))?;
    if !tables.contains_key(&name) {
        return Err(missing_table(&name));
    }
    let rest = rest.trim_start();

    if let Some(definition) = rest.strip_prefix("ADD COLUMN ") {
        let (definition, constraint) = match definition.split_once(", ADD CONSTRAINT") {
            Some((column, fk)) => (column, Some(format!("CONSTRAINT{}", fk))),
            None => (definition, None),
        };
        let (column, after) = parse_column(definition).ok_or_else(|| unparsed(statement))?;
        let constraint = match constraint {
            Some(clause) => Some(parse_constraint(&clause).ok_or_else(|| unparsed(statement))?),
            None => None,
        };

        let target = &tables[&name];
        if target.column(&column.name).is_some() {
            return Err(exec_err(
                ExecErrorKind::DuplicateColumn,
                1060,
                format!("Duplicate column name '{}'", column.name),
            ));
        }
        let position = match &after {
            Some(after) => Some(
                target
                    .columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(after))
                    .ok_or_else(|| {
                        exec_err(
                            ExecErrorKind::Other,
                            1054,
                            format!("Unknown column '{}' in '{}'", after, name),
                        )
                    })?,
            ),
            None => None,
        };
        if let Some((fk, parent)) = &constraint {
            check_constraint(tables, &name, fk, parent)?;
        }

        if let Some(target) = tables.get_mut(&name) {
            match position {
                Some(idx) => target.columns.insert(idx + 1, column),
                None => target.columns.push(column),
            }
            if let Some((fk, parent)) = constraint {
                target.foreign_keys.insert(fk, parent);
            }
        }
        return Ok(0);
    }

    if let Some(definition) = rest.strip_prefix("MODIFY COLUMN ") {
        let (column, _) = parse_column(definition).ok_or_else(|| unparsed(statement))?;
        let target = tables.get_mut(&name).ok_or_else(|| missing_table(&name))?;
        let existing = target
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&column.name))
            .ok_or_else(|| {
                exec_err(
                    ExecErrorKind::Other,
                    1054,
                    format!("Unknown column '{}' in '{}'", column.name, name),
                )
            })?;
        *existing = column;
        return Ok(0);
    }

    if let Some(clause) = rest.strip_prefix("ADD ") {
        let (fk, parent) = parse_constraint(clause).ok_or_else(|| unparsed(statement))?;
        check_constraint(tables, &name, &fk, &parent)?;
        if let Some(target) = tables.get_mut(&name) {
            target.foreign_keys.insert(fk, parent);
        }
        return Ok(0);
    }

    if let Some(fk) = rest.strip_prefix("DROP FOREIGN KEY") {
        let (fk, _) = take_ident(fk).ok_or_else(|| unparsed(statement))?;
        let target = tables.get_mut(&name).ok_or_else(|| missing_table(&name))?;
        if target.foreign_keys.remove(&fk).is_none() {
            return Err(exec_err(
                ExecErrorKind::MissingObject,
                1091,
                format!("Can't DROP '{}'; check that column/key exists", fk),
            ));
        }
        return Ok(0);
    }

    Err(unparsed(statement))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_alter() {
        let db = FakeDatabase::new().with_table("material_request", &[("mr_id", "varchar(50)")]);

        db.execute(
            "CREATE TABLE `grn_requests` (\n  `grn_id` VARCHAR(50) NOT NULL,\n  PRIMARY KEY (`grn_id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        )
        .await
        .unwrap();
        db.execute(
            "ALTER TABLE `grn_requests` ADD COLUMN `material_request_id` VARCHAR(50) NULL AFTER `grn_id`, \
             ADD CONSTRAINT `fk_grn_mr` FOREIGN KEY (`material_request_id`) REFERENCES `material_request` (`mr_id`)",
        )
        .await
        .unwrap();

        let table = db.table("grn_requests").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[1].column_type, "VARCHAR(50)");
        assert!(!table.columns[0].nullable);
        assert_eq!(table.foreign_keys.get("fk_grn_mr").map(String::as_str), Some("material_request"));

        let dup = db
            .execute("ALTER TABLE `grn_requests` ADD COLUMN `grn_id` INT NULL")
            .await
            .unwrap_err();
        assert_eq!(dup.kind, ExecErrorKind::DuplicateColumn);
        assert_eq!(dup.code, Some(1060));
    }

    #[tokio::test]
    async fn test_missing_parent_and_drop() {
        let db = FakeDatabase::new()
            .with_table("job_card", &[("work_order_id", "varchar(50)")])
            .with_foreign_key("job_card", "fk_job_card_wo", "work_order");

        let err = db
            .execute("ALTER TABLE `job_card` ADD CONSTRAINT `fk_x` FOREIGN KEY (`work_order_id`) REFERENCES `missing` (`id`)")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ExecErrorKind::MissingReferencedTable);

        db.execute("ALTER TABLE `job_card` DROP FOREIGN KEY `fk_job_card_wo`")
            .await
            .unwrap();
        let err = db
            .execute("ALTER TABLE `job_card` DROP FOREIGN KEY `fk_job_card_wo`")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ExecErrorKind::MissingObject);
    }

    #[tokio::test]
    async fn test_ledger_and_lock() {
        let db = FakeDatabase::new();
        assert!(!db.exists().await.unwrap());
        assert!(db.applied().await.is_err());
        db.init().await.unwrap();
        assert!(db.applied().await.unwrap().is_empty());

        assert!(db.acquire(Duration::from_secs(1)).await.unwrap());
        assert!(!db.is_free().await.unwrap());
        db.release().await.unwrap();
        assert!(db.is_free().await.unwrap());

        let busy = FakeDatabase::new().hold_lock_elsewhere();
        assert!(!busy.acquire(Duration::from_secs(1)).await.unwrap());
    }
}

//! Schema 对象定义
//!
//! 列、索引、外键、表的声明式描述，迁移步骤由它们组合而成

use nobal_common::validate_identifier;
use nobal_errors::{AppError, AppResult};

/// 列默认值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// 字符串字面量，渲染时加引号
    Literal(String),
    /// 原样输出的表达式，例如 `0`、`TRUE`、`CURRENT_TIMESTAMP`
    Expression(String),
}

/// 列定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// SQL 类型，例如 `VARCHAR(100)`、`DECIMAL(18,6)`
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    /// `AUTO_INCREMENT`、`ON UPDATE CURRENT_TIMESTAMP` 等附加属性
    pub extra: Option<String>,
    /// 新增列时放在哪一列之后
    pub after: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            extra: None,
            after: None,
        }
    }

    /// ENUM 列
    pub fn enumeration(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(name, crate::render::enum_type(values))
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_str(mut self, value: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Expression(expr.into()));
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.nullable = false;
        self.extra = Some("AUTO_INCREMENT".to_string());
        self
    }

    /// `TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP`
    pub fn on_update_current_timestamp(mut self) -> Self {
        self.extra = Some("ON UPDATE CURRENT_TIMESTAMP".to_string());
        self
    }

    pub fn after(mut self, column: impl Into<String>) -> Self {
        self.after = Some(column.into());
        self
    }

    pub(crate) fn validate(&self) -> AppResult<()> {
        validate_identifier(&self.name)?;
        if let Some(after) = &self.after {
            validate_identifier(after)?;
        }
        if self.sql_type.trim().is_empty() {
            return Err(AppError::validation(format!(
                "column `{}` has no SQL type",
                self.name
            )));
        }
        Ok(())
    }
}

/// 外键引用动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// 外键定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyDef {
    /// 单列外键
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            referenced_table: referenced_table.into(),
            referenced_columns: vec![referenced_column.into()],
            on_delete: None,
            on_update: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub(crate) fn validate(&self) -> AppResult<()> {
        validate_identifier(&self.name)?;
        validate_identifier(&self.referenced_table)?;
        if self.columns.is_empty() || self.columns.len() != self.referenced_columns.len() {
            return Err(AppError::validation(format!(
                "foreign key `{}` must map the same number of columns on both sides",
                self.name
            )));
        }
        for column in self.columns.iter().chain(&self.referenced_columns) {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

/// 索引定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            unique: true,
            ..Self::new(name, columns)
        }
    }

    pub(crate) fn validate(&self) -> AppResult<()> {
        validate_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(AppError::validation(format!(
                "index `{}` has no columns",
                self.name
            )));
        }
        self.columns.iter().try_for_each(|c| validate_identifier(c))
    }
}

/// 表定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKeyDef) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// 外键引用的其他表（不含自引用）
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.as_str())
            .filter(|t| *t != self.name)
            .collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    pub(crate) fn validate(&self) -> AppResult<()> {
        validate_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(AppError::validation(format!(
                "table `{}` has no columns",
                self.name
            )));
        }
        for column in &self.columns {
            column.validate()?;
            if column.after.is_some() {
                return Err(AppError::validation(format!(
                    "column `{}.{}` uses AFTER inside CREATE TABLE",
                    self.name, column.name
                )));
            }
        }
        for key in &self.primary_key {
            if !self.columns.iter().any(|c| &c.name == key) {
                return Err(AppError::validation(format!(
                    "primary key column `{}` is not defined on `{}`",
                    key, self.name
                )));
            }
        }
        self.indexes.iter().try_for_each(IndexDef::validate)?;
        self.foreign_keys.iter().try_for_each(ForeignKeyDef::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_builder() {
        let column = ColumnDef::new("material_status", "VARCHAR(50)")
            .default_str("pending")
            .after("item_code");

        assert!(column.nullable);
        assert_eq!(column.default, Some(DefaultValue::Literal("pending".to_string())));
        assert_eq!(column.after.as_deref(), Some("item_code"));
        assert!(column.validate().is_ok());
    }

    #[test]
    fn test_auto_increment_is_not_null() {
        let column = ColumnDef::new("line_id", "INT").auto_increment();
        assert!(!column.nullable);
        assert_eq!(column.extra.as_deref(), Some("AUTO_INCREMENT"));
    }

    #[test]
    fn test_foreign_key_column_count_mismatch() {
        let mut fk = ForeignKeyDef::new("fk_x", "a", "parent", "id");
        fk.referenced_columns.push("other".to_string());
        assert!(fk.validate().is_err());
    }

    #[test]
    fn test_table_validation() {
        let table = TableDef::new("bom_line")
            .column(ColumnDef::new("line_id", "INT").auto_increment())
            .column(ColumnDef::new("bom_id", "VARCHAR(50)").not_null())
            .primary_key(&["line_id"])
            .index(IndexDef::new("idx_bom_id", &["bom_id"]))
            .foreign_key(ForeignKeyDef::new("fk_bom_line_bom", "bom_id", "bom", "bom_id"));
        assert!(table.validate().is_ok());
        assert_eq!(table.referenced_tables(), vec!["bom"]);

        let bad = TableDef::new("bom_line")
            .column(ColumnDef::new("line_id", "INT"))
            .primary_key(&["missing"]);
        assert!(bad.validate().is_err());

        assert!(TableDef::new("empty").validate().is_err());
    }

    #[test]
    fn test_self_reference_not_listed() {
        let table = TableDef::new("operation")
            .column(ColumnDef::new("id", "INT"))
            .column(ColumnDef::new("parent_id", "INT"))
            .foreign_key(ForeignKeyDef::new("fk_parent", "parent_id", "operation", "id"));
        assert!(table.referenced_tables().is_empty());
    }
}

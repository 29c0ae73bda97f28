//! 各表共用的列

use nobal_migration_core::ColumnDef;

/// 自增主键 `id`
pub(crate) fn id() -> ColumnDef {
    ColumnDef::new("id", "INT").auto_increment()
}

pub(crate) fn created_at() -> ColumnDef {
    ColumnDef::new("created_at", "TIMESTAMP").default_expr("CURRENT_TIMESTAMP")
}

pub(crate) fn updated_at() -> ColumnDef {
    ColumnDef::new("updated_at", "TIMESTAMP")
        .default_expr("CURRENT_TIMESTAMP")
        .on_update_current_timestamp()
}

/// 单据编号一类的字符串主键
pub(crate) fn code(name: &str) -> ColumnDef {
    ColumnDef::new(name, "VARCHAR(50)").not_null()
}

pub(crate) fn quantity(name: &str) -> ColumnDef {
    ColumnDef::new(name, "DECIMAL(18,6)").default_expr("0")
}

pub(crate) fn amount(name: &str) -> ColumnDef {
    ColumnDef::new(name, "DECIMAL(18,2)").default_expr("0")
}

pub(crate) fn flag(name: &str, default: bool) -> ColumnDef {
    ColumnDef::new(name, "BOOLEAN").default_expr(if default { "TRUE" } else { "FALSE" })
}

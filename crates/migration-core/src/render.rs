//! MySQL DDL 渲染
//!
//! 渲染结果同时用于执行和计算校验和，输出必须稳定

use nobal_common::{quote_identifier, quote_literal};

use crate::schema::{ColumnDef, DefaultValue, ForeignKeyDef, IndexDef, TableDef};

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ENUM 类型
pub fn enum_type(values: &[&str]) -> String {
    let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
    format!("ENUM({})", values.join(","))
}

/// 列定义（不含 AFTER）
pub fn column_definition(column: &ColumnDef) -> String {
    let mut sql = format!(
        "{} {} {}",
        quote_identifier(&column.name),
        column.sql_type,
        if column.nullable { "NULL" } else { "NOT NULL" }
    );
    match &column.default {
        Some(DefaultValue::Literal(value)) => {
            sql.push_str(" DEFAULT ");
            sql.push_str(&quote_literal(value));
        }
        Some(DefaultValue::Expression(expr)) => {
            sql.push_str(" DEFAULT ");
            sql.push_str(expr);
        }
        None => {}
    }
    if let Some(extra) = &column.extra {
        sql.push(' ');
        sql.push_str(extra);
    }
    sql
}

fn positioned_column(column: &ColumnDef) -> String {
    match &column.after {
        Some(after) => format!(
            "{} AFTER {}",
            column_definition(column),
            quote_identifier(after)
        ),
        None => column_definition(column),
    }
}

fn foreign_key_clause(fk: &ForeignKeyDef) -> String {
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_identifier(&fk.name),
        column_list(&fk.columns),
        quote_identifier(&fk.referenced_table),
        column_list(&fk.referenced_columns)
    );
    if let Some(action) = fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action.as_sql());
    }
    if let Some(action) = fk.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action.as_sql());
    }
    sql
}

/// `CREATE TABLE`，`include_foreign_keys = false` 用于父表缺失时的降级建表
pub fn create_table(table: &TableDef, include_foreign_keys: bool) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("  {}", column_definition(c)))
        .collect();

    if !table.primary_key.is_empty() {
        lines.push(format!("  PRIMARY KEY ({})", column_list(&table.primary_key)));
    }
    for index in &table.indexes {
        lines.push(format!(
            "  {}KEY {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_identifier(&index.name),
            column_list(&index.columns)
        ));
    }
    if include_foreign_keys {
        for fk in &table.foreign_keys {
            lines.push(format!("  {}", foreign_key_clause(fk)));
        }
    }

    format!(
        "CREATE TABLE {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        quote_identifier(&table.name),
        lines.join(",\n")
    )
}

pub fn add_column(table: &str, column: &ColumnDef) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_identifier(table),
        positioned_column(column)
    )
}

/// 新增列并同时加外键，单条语句保证要么都成功要么都不生效
pub fn add_column_with_foreign_key(table: &str, column: &ColumnDef, fk: &ForeignKeyDef) -> String {
    format!(
        "{}, ADD {}",
        add_column(table, column),
        foreign_key_clause(fk)
    )
}

pub fn modify_column(table: &str, column: &ColumnDef) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {}",
        quote_identifier(table),
        positioned_column(column)
    )
}

pub fn create_index(table: &str, index: &IndexDef) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_identifier(&index.name),
        quote_identifier(table),
        column_list(&index.columns)
    )
}

pub fn add_foreign_key(table: &str, fk: &ForeignKeyDef) -> String {
    format!(
        "ALTER TABLE {} ADD {}",
        quote_identifier(table),
        foreign_key_clause(fk)
    )
}

pub fn drop_foreign_key(table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP FOREIGN KEY {}",
        quote_identifier(table),
        quote_identifier(name)
    )
}

/// 规范化列类型，便于与 `INFORMATION_SCHEMA.COLUMNS.COLUMN_TYPE` 比较
///
/// 引号外转小写并去掉空白，引号内（ENUM 取值）保持原样；
/// 整数显示宽度（8.0.19 起不再返回）统一去掉，`BOOLEAN` 按 `tinyint(1)` 处理
pub fn normalize_column_type(column_type: &str) -> String {
    let mut out = String::with_capacity(column_type.len());
    let mut in_quote = false;
    let mut chars = column_type.trim().chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            out.push(c);
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    in_quote = false;
                }
            }
        } else if c == '\'' {
            in_quote = true;
            out.push(c);
        } else if !c.is_whitespace() {
            out.push(c.to_ascii_lowercase());
        } else if out.ends_with(|p: char| p.is_ascii_alphanumeric() || p == ')')
            && chars.peek().is_some_and(|n| n.is_ascii_alphabetic())
        {
            // `int unsigned` 保留单词间的空格
            out.push(' ');
        }
    }

    match out.as_str() {
        "boolean" | "bool" => return "tinyint(1)".to_string(),
        "integer" => return "int".to_string(),
        "decimal" => return "decimal(10,0)".to_string(),
        _ => {}
    }

    for int_type in ["bigint", "mediumint", "smallint", "int"] {
        if let Some(rest) = out.strip_prefix(int_type) {
            if let Some(inner) = rest.strip_prefix('(') {
                if let Some(idx) = inner.find(')') {
                    if inner[..idx].chars().all(|c| c.is_ascii_digit()) {
                        return format!("{}{}", int_type, &inner[idx + 1..]);
                    }
                }
            }
            break;
        }
    }

    out
}

/// 解析 ENUM 取值，非 ENUM 类型返回 None
pub fn enum_values(column_type: &str) -> Option<Vec<String>> {
    let normalized = normalize_column_type(column_type);
    let body = normalized.strip_prefix("enum(")?.strip_suffix(')')?;

    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match (in_quote, c) {
            (false, '\'') => in_quote = true,
            (true, '\'') => {
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_quote = false;
                    values.push(std::mem::take(&mut current));
                }
            }
            (true, _) => current.push(c),
            (false, _) => {}
        }
    }

    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReferentialAction;

    #[test]
    fn test_add_column() {
        let column = ColumnDef::new("item_code", "VARCHAR(50)").after("item_id");
        assert_eq!(
            add_column("stock_ledger", &column),
            "ALTER TABLE `stock_ledger` ADD COLUMN `item_code` VARCHAR(50) NULL AFTER `item_id`"
        );
    }

    #[test]
    fn test_column_defaults() {
        let literal = ColumnDef::new("material_status", "VARCHAR(50)").default_str("pending");
        assert_eq!(
            column_definition(&literal),
            "`material_status` VARCHAR(50) NULL DEFAULT 'pending'"
        );

        let expr = ColumnDef::new("hourly_rate", "DECIMAL(18,2)").default_expr("0");
        assert_eq!(
            column_definition(&expr),
            "`hourly_rate` DECIMAL(18,2) NULL DEFAULT 0"
        );

        let ts = ColumnDef::new("updated_at", "TIMESTAMP")
            .default_expr("CURRENT_TIMESTAMP")
            .on_update_current_timestamp();
        assert_eq!(
            column_definition(&ts),
            "`updated_at` TIMESTAMP NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_add_column_with_foreign_key() {
        let column = ColumnDef::new("material_request_id", "VARCHAR(50)");
        let fk = ForeignKeyDef::new(
            "fk_grn_requests_material_request",
            "material_request_id",
            "material_request",
            "mr_id",
        )
        .on_delete(ReferentialAction::SetNull);

        assert_eq!(
            add_column_with_foreign_key("grn_requests", &column, &fk),
            "ALTER TABLE `grn_requests` ADD COLUMN `material_request_id` VARCHAR(50) NULL, \
             ADD CONSTRAINT `fk_grn_requests_material_request` FOREIGN KEY (`material_request_id`) \
             REFERENCES `material_request` (`mr_id`) ON DELETE SET NULL"
        );
    }

    #[test]
    fn test_create_table() {
        let table = TableDef::new("bom_line")
            .column(ColumnDef::new("line_id", "INT").auto_increment())
            .column(ColumnDef::new("bom_id", "VARCHAR(50)").not_null())
            .primary_key(&["line_id"])
            .index(IndexDef::new("idx_bom_id", &["bom_id"]))
            .foreign_key(
                ForeignKeyDef::new("fk_bom_line_bom", "bom_id", "bom", "bom_id")
                    .on_delete(ReferentialAction::Cascade),
            );

        let expected = "CREATE TABLE `bom_line` (\n\
                        \x20 `line_id` INT NOT NULL AUTO_INCREMENT,\n\
                        \x20 `bom_id` VARCHAR(50) NOT NULL,\n\
                        \x20 PRIMARY KEY (`line_id`),\n\
                        \x20 KEY `idx_bom_id` (`bom_id`),\n\
                        \x20 CONSTRAINT `fk_bom_line_bom` FOREIGN KEY (`bom_id`) REFERENCES `bom` (`bom_id`) ON DELETE CASCADE\n\
                        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
        assert_eq!(create_table(&table, true), expected);
        assert!(!create_table(&table, false).contains("CONSTRAINT"));
    }

    #[test]
    fn test_index_and_foreign_key_statements() {
        assert_eq!(
            create_index("production_plan_raw_material", &IndexDef::new("idx_pprm_mr_id", &["mr_id"])),
            "CREATE INDEX `idx_pprm_mr_id` ON `production_plan_raw_material` (`mr_id`)"
        );
        assert_eq!(
            create_index("users", &IndexDef::unique("uk_users_email", &["email"])),
            "CREATE UNIQUE INDEX `uk_users_email` ON `users` (`email`)"
        );
        assert_eq!(
            drop_foreign_key("selling_sales_order", "selling_sales_order_ibfk_1"),
            "ALTER TABLE `selling_sales_order` DROP FOREIGN KEY `selling_sales_order_ibfk_1`"
        );
    }

    #[test]
    fn test_enum_type_and_values() {
        let ty = enum_type(&["draft", "on_hold", "Purchase Receipt"]);
        assert_eq!(ty, "ENUM('draft','on_hold','Purchase Receipt')");
        assert_eq!(
            enum_values(&ty).unwrap(),
            vec!["draft", "on_hold", "Purchase Receipt"]
        );
        assert_eq!(enum_values("enum('it''s','b')").unwrap(), vec!["it's", "b"]);
        assert!(enum_values("varchar(50)").is_none());
    }

    #[test]
    fn test_normalize_column_type() {
        assert_eq!(normalize_column_type("VARCHAR(50)"), "varchar(50)");
        assert_eq!(normalize_column_type("DECIMAL(18, 2)"), "decimal(18,2)");
        assert_eq!(normalize_column_type("BOOLEAN"), "tinyint(1)");
        assert_eq!(normalize_column_type("INT(11)"), "int");
        assert_eq!(normalize_column_type("int"), "int");
        assert_eq!(normalize_column_type("BIGINT(20) UNSIGNED"), "bigint unsigned");
        assert_eq!(normalize_column_type("tinyint(1)"), "tinyint(1)");
        assert_eq!(
            normalize_column_type("ENUM('Purchase Receipt', 'Issue')"),
            "enum('Purchase Receipt','Issue')"
        );
        assert_eq!(
            normalize_column_type("ENUM('Purchase Receipt','Issue')"),
            normalize_column_type("enum('Purchase Receipt','Issue')")
        );
    }
}

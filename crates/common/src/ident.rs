//! SQL 标识符与字面量
//!
//! DDL 语句无法绑定参数，表名、列名只能拼接进 SQL，
//! 所以所有标识符先校验再用反引号包裹

use nobal_errors::{AppError, AppResult};

/// MySQL 标识符最大长度
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// 校验标识符：非空、不超过 64 字符、仅含字母数字下划线和 `$`、不能全为数字
pub fn validate_identifier(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("identifier must not be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(AppError::validation(format!(
            "identifier `{}` exceeds {} characters",
            name, MAX_IDENTIFIER_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(AppError::validation(format!(
            "identifier `{}` contains unsupported characters",
            name
        )));
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(format!(
            "identifier `{}` must not be purely numeric",
            name
        )));
    }
    Ok(())
}

/// 用反引号包裹标识符
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// 转义字符串字面量（单引号包裹）
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "''");
    format!("'{}'", escaped)
}

//! MySQL 错误号分类
//!
//! 迁移引擎只看 `ExecErrorKind`，错误号到分类的映射集中在这里

use nobal_ports::{ExecError, ExecErrorKind};
use sqlx::mysql::MySqlDatabaseError;

/// ER_TABLE_EXISTS_ERROR
pub const ER_TABLE_EXISTS: u16 = 1050;
/// ER_BAD_FIELD_ERROR
pub const ER_BAD_FIELD: u16 = 1054;
/// ER_DUP_FIELDNAME
pub const ER_DUP_FIELDNAME: u16 = 1060;
/// ER_DUP_KEYNAME
pub const ER_DUP_KEYNAME: u16 = 1061;
/// ER_CANT_DROP_FIELD_OR_KEY
pub const ER_CANT_DROP_FIELD_OR_KEY: u16 = 1091;
/// ER_NO_SUCH_TABLE
pub const ER_NO_SUCH_TABLE: u16 = 1146;
/// ER_FK_DUP_NAME
pub const ER_FK_DUP_NAME: u16 = 1826;
/// ER_FK_CANNOT_OPEN_PARENT
pub const ER_FK_CANNOT_OPEN_PARENT: u16 = 1824;

/// 错误号对应的分类
pub fn classify_code(code: u16) -> ExecErrorKind {
    match code {
        ER_TABLE_EXISTS => ExecErrorKind::TableExists,
        ER_DUP_FIELDNAME => ExecErrorKind::DuplicateColumn,
        ER_DUP_KEYNAME => ExecErrorKind::DuplicateKey,
        ER_FK_DUP_NAME => ExecErrorKind::DuplicateForeignKey,
        ER_CANT_DROP_FIELD_OR_KEY => ExecErrorKind::MissingObject,
        ER_FK_CANNOT_OPEN_PARENT => ExecErrorKind::MissingReferencedTable,
        ER_NO_SUCH_TABLE => ExecErrorKind::MissingTable,
        // 1215 (Cannot add foreign key constraint) 也可能是列类型不匹配，不能当作父表缺失
        _ => ExecErrorKind::Other,
    }
}

/// sqlx 错误中的 MySQL 错误号
pub fn mysql_error_number(error: &sqlx::Error) -> Option<u16> {
    match error {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number()),
        _ => None,
    }
}

/// 把 sqlx 错误转换为执行错误
pub fn to_exec_error(error: &sqlx::Error) -> ExecError {
    match error {
        sqlx::Error::Database(db_err) => {
            let code = mysql_error_number(error);
            let kind = code.map(classify_code).unwrap_or(ExecErrorKind::Other);
            ExecError::new(kind, code, db_err.message())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            ExecError::new(ExecErrorKind::Connection, None, error.to_string())
        }
        _ => ExecError::other(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_code() {
        assert_eq!(classify_code(1060), ExecErrorKind::DuplicateColumn);
        assert_eq!(classify_code(1061), ExecErrorKind::DuplicateKey);
        assert_eq!(classify_code(1050), ExecErrorKind::TableExists);
        assert_eq!(classify_code(1826), ExecErrorKind::DuplicateForeignKey);
        assert_eq!(classify_code(1091), ExecErrorKind::MissingObject);
        assert_eq!(classify_code(1824), ExecErrorKind::MissingReferencedTable);
        assert_eq!(classify_code(1146), ExecErrorKind::MissingTable);
        assert_eq!(classify_code(1215), ExecErrorKind::Other);
        assert_eq!(classify_code(1054), ExecErrorKind::Other);
    }

    #[test]
    fn test_non_database_errors() {
        let err = to_exec_error(&sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, ExecErrorKind::Connection);
        assert_eq!(err.code, None);

        let err = to_exec_error(&sqlx::Error::RowNotFound);
        assert_eq!(err.kind, ExecErrorKind::Other);
        assert_eq!(mysql_error_number(&sqlx::Error::RowNotFound), None);
    }
}

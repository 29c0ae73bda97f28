//! migration-core - 幂等 schema 迁移引擎
//!
//! 迁移由声明式步骤组成，每个步骤执行前先查询当前 schema，
//! 目标状态已满足时跳过，因此同一迁移可以对任意状态的数据库重复执行。
//! 已成功的迁移登记在只进不退的台账中。

pub mod migration;
mod projection;
pub mod render;
pub mod report;
pub mod runner;
pub mod schema;
pub mod step;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use migration::{Catalog, Migration};
pub use report::*;
pub use runner::{detect_drift, Migrator, MigratorOptions};
pub use schema::{ColumnDef, DefaultValue, ForeignKeyDef, IndexDef, ReferentialAction, TableDef};
pub use step::Step;

//! ports - 抽象 trait 层
//!
//! 迁移引擎只依赖这些 trait，MySQL 实现在 `nobal-adapter-mysql`

mod executor;
mod ledger;
mod lock;
mod schema;

pub use executor::*;
pub use ledger::*;
pub use lock::*;
pub use schema::*;

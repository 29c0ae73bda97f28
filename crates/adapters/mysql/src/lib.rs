//! nobal-adapter-mysql - MySQL 适配器
//!
//! 实现迁移引擎的四个 port，另外提供运维用的表查询与清空

mod config;
mod connection;
mod error_code;
mod executor;
mod inspector;
mod ledger;
mod lock;
mod maintenance;
mod retry;

pub use config::*;
pub use connection::*;
pub use error_code::*;
pub use executor::*;
pub use inspector::*;
pub use ledger::*;
pub use lock::*;
pub use maintenance::*;
pub use retry::*;

//! nobal-bootstrap - 命令行启动骨架
//!
//! 加载配置、初始化日志、建立连接池并组装迁移引擎

mod infrastructure;
mod runtime;

pub use infrastructure::*;
pub use runtime::*;

//! common - 通用类型和工具库

pub mod ident;
pub mod retry;

pub use ident::*;
pub use retry::*;

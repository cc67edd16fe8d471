//! 应用层 - 命令
//!
//! 广播生成是唯一的写操作

mod assemble_commands;

pub mod handlers;

pub use assemble_commands::*;

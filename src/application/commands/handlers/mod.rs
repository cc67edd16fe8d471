//! Command Handlers 实现

mod assemble_handler;

pub use assemble_handler::*;

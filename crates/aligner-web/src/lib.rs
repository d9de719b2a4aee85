//! # 病例 Web 模块
//!
//! REST 接口层，操作一律委托给工作流引擎，不直接实现业务规则。

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};

//! # 隐形矫正器病例管理系统
//!
//! 聚合导出各子模块，供演示程序与外部调用方使用。

pub use aligner_core as core;
pub use aligner_database as database;
pub use aligner_workflow as workflow;

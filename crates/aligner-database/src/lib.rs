//! # 病例数据库模块
//!
//! 基于 sqlx/PostgreSQL 的记录存储实现。状态与方案写入都是
//! 条件化的单行更新，并发竞争的失败方收到 Conflict。
//! 另提供内存实现，供测试与演示使用。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryCaseStore;
pub use queries::CaseQueries;
pub use store::PgCaseStore;

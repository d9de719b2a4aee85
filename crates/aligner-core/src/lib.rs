//! # Aligner Core
//!
//! 病例管理系统的核心模块，提供基础数据结构、错误定义和记录存储契约。

pub mod error;
pub mod models;
pub mod store;

pub use error::{CaseError, Result};
pub use models::*;
pub use store::CaseStore;

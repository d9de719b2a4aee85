//! # 扫描件存储模块
//!
//! 负责病例扫描件与压缩包的存储管理。核心记录只保存路径字符串，
//! 实际字节由本模块按固定目录约定落盘。

pub mod storage;

pub use storage::*;

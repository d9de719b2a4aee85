//! 扫描件存储管理
//!
//! 路径约定：cases/{病例ID}/{类别}/{文件名}。路径字符串一旦写入
//! 病例记录即视为不透明引用，读取方不解析其结构。

use aligner_core::{CaseError, Result};
use std::path::{Path, PathBuf};

/// 扫描件类别，决定病例目录下的子目录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    UpperScan,
    LowerScan,
    BiteScan,
    Archive,
    Additional,
}

impl ScanKind {
    pub fn subdir(&self) -> &'static str {
        match self {
            ScanKind::UpperScan => "upper",
            ScanKind::LowerScan => "lower",
            ScanKind::BiteScan => "bite",
            ScanKind::Archive => "archive",
            ScanKind::Additional => "additional",
        }
    }
}

/// 生成病例扫描件的存储相对路径
pub fn scan_path(case_id: i64, kind: ScanKind, filename: &str) -> Result<String> {
    if filename.trim().is_empty() {
        return Err(CaseError::Validation("filename must not be empty".to_string()));
    }
    if filename.contains('/') || filename.contains("..") {
        return Err(CaseError::Validation(format!(
            "invalid scan filename: {}",
            filename
        )));
    }
    Ok(format!("cases/{}/{}/{}", case_id, kind.subdir(), filename))
}

/// 存储管理器
pub struct ScanStorage {
    base_path: PathBuf,
}

impl ScanStorage {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: PathBuf::from(base_path),
        }
    }

    /// 存储扫描件，返回写入的相对路径
    pub async fn store_file(&self, data: &[u8], path: &str) -> Result<String> {
        let full_path = self.base_path.join(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        tracing::debug!(path = %path, size = data.len(), "Scan file stored");
        Ok(path.to_string())
    }

    /// 读取扫描件
    pub async fn get_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    /// 删除扫描件
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let full_path = self.base_path.join(path);
        tokio::fs::remove_file(full_path).await?;
        Ok(())
    }

    /// 扫描件是否存在
    pub async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.base_path.join(path))
            .await
            .unwrap_or(false)
    }

    /// 删除某病例的全部扫描件目录
    pub async fn delete_case_files(&self, case_id: i64) -> Result<()> {
        let case_dir = self.base_path.join("cases").join(case_id.to_string());
        if Path::new(&case_dir).exists() {
            tokio::fs::remove_dir_all(case_dir).await?;
        }
        Ok(())
    }
}

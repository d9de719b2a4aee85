//! 方案编辑锁定策略
//!
//! 方案数量字段（矫正器数量、疗程、价格、材料）只在病例进入
//! 备货之前可以修改。谓词在界面展示与持久化前各检查一次，
//! 存储层的条件写入兜底，过期客户端无法绕过锁定。

use aligner_core::{CaseError, CaseStatus, Result};

/// 方案数量字段是否允许修改
///
/// status ∉ {ready_for_delivery, delivered, completed} 时为 true。
pub fn is_plan_edit_allowed(status: CaseStatus) -> bool {
    !status.is_plan_locked()
}

/// 写入前的锁定校验
pub fn ensure_plan_editable(status: CaseStatus) -> Result<()> {
    if is_plan_edit_allowed(status) {
        Ok(())
    } else {
        Err(CaseError::Validation(format!(
            "plan fields are locked in status {}",
            status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_truth_table() {
        for status in CaseStatus::all() {
            let expected = !matches!(
                status,
                CaseStatus::ReadyForDelivery | CaseStatus::Delivered | CaseStatus::Completed
            );
            assert_eq!(is_plan_edit_allowed(status), expected, "status {}", status);
        }
    }

    #[test]
    fn test_ensure_plan_editable() {
        assert!(ensure_plan_editable(CaseStatus::Submitted).is_ok());
        assert!(ensure_plan_editable(CaseStatus::Approved).is_ok());
        assert!(matches!(
            ensure_plan_editable(CaseStatus::Delivered),
            Err(CaseError::Validation(_))
        ));
    }
}

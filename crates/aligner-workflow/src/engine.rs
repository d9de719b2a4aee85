//! 病例工作流引擎
//!
//! 协调状态机、锁定策略、IPR 图表与再矫正生成，提供统一的
//! 工作流管理接口。引擎本身不持有任何状态机以外的数据，所有
//! 持久化都经由记录存储的条件更新完成，竞争失败方收到 Conflict。

use crate::{
    ipr, plan_lock, refinement,
    state_machine::{CaseAction, CaseStateMachine},
};
use aligner_core::{
    is_valid_tooth, ActorRole, CaseError, CaseRecord, CaseStatus, CaseStore, IprEntry, NewCase,
    PlanUpdate, Result, ToothCondition,
};
use std::collections::BTreeMap;

/// 病例工作流引擎
#[derive(Debug, Default)]
pub struct CaseWorkflowEngine {
    state_machine: CaseStateMachine,
}

impl CaseWorkflowEngine {
    /// 创建新的工作流引擎
    pub fn new() -> Self {
        Self {
            state_machine: CaseStateMachine::new(),
        }
    }

    /// 获取状态机实例
    pub fn state_machine(&self) -> &CaseStateMachine {
        &self.state_machine
    }

    /// 当前角色对当前记录可执行的动作
    pub fn list_available_actions(&self, record: &CaseRecord, role: ActorRole) -> Vec<CaseAction> {
        self.state_machine.possible_actions(record.status, role)
    }

    /// 校验并计算一次状态转换
    ///
    /// 纯函数：返回目标状态或错误，不产生任何副作用。
    /// 提交医生确认前额外要求方案数量字段齐备且为正。
    pub fn attempt_transition(
        &self,
        record: &CaseRecord,
        action: CaseAction,
        role: ActorRole,
    ) -> Result<CaseStatus> {
        let new_status = self.state_machine.transition(record.status, action, role)?;
        if action == CaseAction::SendForApproval {
            validate_plan_for_approval(record)?;
        }
        Ok(new_status)
    }

    /// 执行并持久化一次状态转换
    ///
    /// 以读取时的状态为条件写入，两个并发操作者只有一方能成功。
    pub async fn apply_transition(
        &self,
        store: &dyn CaseStore,
        case_id: i64,
        action: CaseAction,
        role: ActorRole,
    ) -> Result<CaseRecord> {
        let record = store.get_case(case_id).await?;
        let new_status = self.attempt_transition(&record, action, role)?;
        let updated = store.update_status(case_id, record.status, new_status).await?;
        tracing::info!(
            "Case {} transitioned from {} to {} by {:?}",
            case_id,
            record.status,
            new_status,
            role
        );
        Ok(updated)
    }

    /// 创建新病例（入件）
    ///
    /// 入件通道不接受再矫正字段：子病例只能经由再矫正申请产生，
    /// 否则资格校验与唯一进行中约束都会被绕过。
    pub async fn create_case(&self, store: &dyn CaseStore, new_case: NewCase) -> Result<CaseRecord> {
        if new_case.parent_case_id.is_some() || new_case.refinement_reason.is_some() {
            return Err(CaseError::Validation(
                "refinement cases must be created through a refinement request".to_string(),
            ));
        }
        new_case.validate()?;
        let record = store.insert_case(new_case).await?;
        tracing::info!("Created case {} for clinician {}", record.id, record.user_id);
        Ok(record)
    }

    /// 更新方案字段
    ///
    /// 先按读取到的状态检查锁定策略，存储层的条件写入兜底并发场景。
    pub async fn update_plan(
        &self,
        store: &dyn CaseStore,
        case_id: i64,
        update: PlanUpdate,
    ) -> Result<CaseRecord> {
        update.validate()?;
        let record = store.get_case(case_id).await?;
        plan_lock::ensure_plan_editable(record.status)?;
        let updated = store.update_plan(case_id, update).await?;
        tracing::info!("Updated plan fields for case {}", case_id);
        Ok(updated)
    }

    /// 保存 IPR 图表与牙齿状态
    ///
    /// 全零行在持久化前剔除，图表与方案字段共用同一把编辑锁。
    pub async fn save_ipr_chart(
        &self,
        store: &dyn CaseStore,
        case_id: i64,
        tooth_status: BTreeMap<u8, ToothCondition>,
        updates: BTreeMap<u8, IprEntry>,
    ) -> Result<CaseRecord> {
        for tooth in tooth_status.keys() {
            if !is_valid_tooth(*tooth) {
                return Err(CaseError::Validation(format!(
                    "invalid tooth number: {}",
                    tooth
                )));
            }
        }
        let normalized = ipr::normalize_chart(&updates)?;
        let record = store.get_case(case_id).await?;
        plan_lock::ensure_plan_editable(record.status)?;
        let updated = store.update_chart(case_id, tooth_status, normalized).await?;
        tracing::info!("Saved IPR chart for case {}", case_id);
        Ok(updated)
    }

    /// 申请再矫正
    ///
    /// 原病例须已完成，且同一时间最多一个进行中的再矫正子病例。
    pub async fn request_refinement(
        &self,
        store: &dyn CaseStore,
        case_id: i64,
        reason: &str,
    ) -> Result<CaseRecord> {
        let parent = store.get_case(case_id).await?;
        let siblings = store.list_refinements(case_id).await?;
        refinement::ensure_no_active_refinement(case_id, &siblings)?;
        let new_case = refinement::build_refinement(&parent, reason)?;
        let spawned = store.insert_case(new_case).await?;
        tracing::info!(
            "Spawned refinement case {} from case {}",
            spawned.id,
            case_id
        );
        Ok(spawned)
    }
}

/// 提交医生确认前的方案完整性校验
fn validate_plan_for_approval(record: &CaseRecord) -> Result<()> {
    let plan = &record.plan;
    if !matches!(plan.upper_aligner_count, Some(n) if n > 0) {
        return Err(CaseError::Validation(
            "upper aligner count must be set and positive before sending for approval".to_string(),
        ));
    }
    if !matches!(plan.lower_aligner_count, Some(n) if n > 0) {
        return Err(CaseError::Validation(
            "lower aligner count must be set and positive before sending for approval".to_string(),
        ));
    }
    if !matches!(plan.duration_months, Some(n) if n > 0) {
        return Err(CaseError::Validation(
            "estimated duration must be set and positive before sending for approval".to_string(),
        ));
    }
    Ok(())
}

//! 病例状态机
//!
//! 管理矫正病例从提交到完成的完整生命周期状态转换。
//! 转换表按 (当前状态, 动作, 角色) 三元组索引，任何不在表中的
//! 组合都返回 InvalidTransition，绝不静默忽略。

use aligner_core::{ActorRole, CaseError, CaseStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 状态转换动作
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum CaseAction {
    /// 运营方受理病例
    Accept,
    /// 运营方拒绝病例
    Decline,
    /// 运营方提交方案待医生确认
    SendForApproval,
    /// 医生确认方案
    ApprovePlan,
    /// 医生拒绝方案
    DeclinePlan,
    /// 医生申请中止治疗
    RequestAbortion,
    /// 运营方开始生产
    StartProduction,
    /// 运营方标记备货完成
    MarkReady,
    /// 运营方标记已发货
    MarkDelivered,
    /// 运营方结案
    Complete,
}

impl CaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseAction::Accept => "accept",
            CaseAction::Decline => "decline",
            CaseAction::SendForApproval => "send_for_approval",
            CaseAction::ApprovePlan => "approve_plan",
            CaseAction::DeclinePlan => "decline_plan",
            CaseAction::RequestAbortion => "request_abortion",
            CaseAction::StartProduction => "start_production",
            CaseAction::MarkReady => "mark_ready",
            CaseAction::MarkDelivered => "mark_delivered",
            CaseAction::Complete => "complete",
        }
    }

    pub fn all() -> [CaseAction; 10] {
        [
            CaseAction::Accept,
            CaseAction::Decline,
            CaseAction::SendForApproval,
            CaseAction::ApprovePlan,
            CaseAction::DeclinePlan,
            CaseAction::RequestAbortion,
            CaseAction::StartProduction,
            CaseAction::MarkReady,
            CaseAction::MarkDelivered,
            CaseAction::Complete,
        ]
    }
}

impl fmt::Display for CaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 病例状态机
#[derive(Debug)]
pub struct CaseStateMachine {
    transitions: HashMap<(CaseStatus, CaseAction, ActorRole), CaseStatus>,
}

impl CaseStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        use ActorRole::{Clinician, Operator};
        use CaseAction::*;
        use CaseStatus::*;

        let mut transitions = HashMap::new();

        // 运营方受理与拒绝
        transitions.insert((Submitted, Accept, Operator), Accepted);
        transitions.insert((Submitted, Decline, Operator), Rejected);
        transitions.insert((Accepted, Decline, Operator), Rejected);
        transitions.insert((AwaitingUserApproval, Decline, Operator), Rejected);

        // 运营方提交方案待医生确认（方案数量字段须齐备且为正，由引擎校验）
        transitions.insert((Submitted, SendForApproval, Operator), AwaitingUserApproval);
        transitions.insert((Accepted, SendForApproval, Operator), AwaitingUserApproval);
        transitions.insert((UserRejected, SendForApproval, Operator), AwaitingUserApproval);

        // 医生确认或拒绝方案
        transitions.insert((AwaitingUserApproval, ApprovePlan, Clinician), Approved);
        transitions.insert((AwaitingUserApproval, DeclinePlan, Clinician), UserRejected);

        // 医生在生产前后申请中止
        transitions.insert((Approved, RequestAbortion, Clinician), UserRejected);
        transitions.insert((InProduction, RequestAbortion, Clinician), UserRejected);

        // 生产与交付
        transitions.insert((Approved, StartProduction, Operator), InProduction);
        transitions.insert((InProduction, MarkReady, Operator), ReadyForDelivery);
        transitions.insert((ReadyForDelivery, MarkDelivered, Operator), Delivered);
        transitions.insert((Delivered, Complete, Operator), Completed);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: CaseStatus, action: CaseAction, role: ActorRole) -> bool {
        self.transitions.contains_key(&(from, action, role))
    }

    /// 执行状态转换
    ///
    /// 纯函数，只计算目标状态，持久化由调用方负责。
    pub fn transition(
        &self,
        from: CaseStatus,
        action: CaseAction,
        role: ActorRole,
    ) -> Result<CaseStatus> {
        match self.transitions.get(&(from, action, role)) {
            Some(to) => Ok(*to),
            None => Err(CaseError::InvalidTransition {
                action: action.to_string(),
                status: from.to_string(),
            }),
        }
    }

    /// 当前角色在当前状态下可执行的动作
    pub fn possible_actions(&self, from: CaseStatus, role: ActorRole) -> Vec<CaseAction> {
        let mut actions: Vec<CaseAction> = self
            .transitions
            .keys()
            .filter(|(status, _, actor)| *status == from && *actor == role)
            .map(|(_, action, _)| *action)
            .collect();
        actions.sort();
        actions
    }

    /// 获取所有可能的状态
    pub fn get_all_statuses() -> Vec<CaseStatus> {
        CaseStatus::all().to_vec()
    }
}

impl Default for CaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

//! # 病例工作流模块
//!
//! 提供矫正病例生命周期的核心业务规则，包括：
//! - 病例状态机：双角色（运营方/医生）的状态转换表
//! - 方案编辑锁定策略：决定方案数量字段是否可修改
//! - IPR 图表模型：按颌别邻接表推导牙间隙展示值
//! - 再矫正生成：从已完成病例派生子病例

pub mod engine;
pub mod ipr;
pub mod plan_lock;
pub mod refinement;
pub mod state_machine;

// 重新导出主要类型
pub use engine::CaseWorkflowEngine;
pub use ipr::{Gap, Jaw};
pub use plan_lock::{ensure_plan_editable, is_plan_edit_allowed};
pub use state_machine::{CaseAction, CaseStateMachine};

//! 记录存储边界契约
//!
//! 核心逻辑只通过该接口读写病例记录，不关心底层是关系库还是内存表。
//! 状态与方案写入必须实现为条件化的单行原子更新：两个并发操作者
//! （如运营方拒绝与医生确认同时发生）只能有一方成功，失败方收到
//! Conflict 并重新读取记录，而不是静默覆盖。

use crate::error::Result;
use crate::models::{
    CaseRecord, CaseStatus, IprEntry, NewCase, PlanUpdate, ToothCondition,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// 记录存储接口
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// 按 ID 读取病例，不存在时返回 NotFound
    async fn get_case(&self, id: i64) -> Result<CaseRecord>;

    /// 插入新病例，返回分配 ID 后的完整记录，状态为 submitted
    async fn insert_case(&self, new_case: NewCase) -> Result<CaseRecord>;

    /// 应用方案字段更新
    ///
    /// 写入以"状态未锁定"为条件：记录存在但状态已进入锁定集合时
    /// 返回 Conflict，过期客户端无法绕过锁定策略。
    async fn update_plan(&self, id: i64, update: PlanUpdate) -> Result<CaseRecord>;

    /// 条件状态更新
    ///
    /// 仅当当前状态等于 expected 时写入 new_status，否则返回 Conflict。
    async fn update_status(
        &self,
        id: i64,
        expected: CaseStatus,
        new_status: CaseStatus,
    ) -> Result<CaseRecord>;

    /// 保存牙齿状态与 IPR 数据，条件与 update_plan 相同
    async fn update_chart(
        &self,
        id: i64,
        tooth_status: BTreeMap<u8, ToothCondition>,
        ipr_data: BTreeMap<u8, IprEntry>,
    ) -> Result<CaseRecord>;

    /// 列出指定病例的全部再矫正子病例
    async fn list_refinements(&self, parent_case_id: i64) -> Result<Vec<CaseRecord>>;

    /// 删除病例（运营方的终结操作，不经过状态机）
    async fn delete_case(&self, id: i64) -> Result<()>;
}

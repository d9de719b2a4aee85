//! PostgreSQL 记录存储实现

use crate::connection::DatabasePool;
use crate::queries::CaseQueries;
use aligner_core::{
    CaseError, CaseRecord, CaseStatus, CaseStore, IprEntry, NewCase, PlanUpdate, Result,
    ToothCondition,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// 基于 PostgreSQL 的病例存储
#[derive(Clone)]
pub struct PgCaseStore {
    pool: DatabasePool,
}

impl PgCaseStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn queries(&self) -> CaseQueries<'_> {
        CaseQueries::new(&self.pool)
    }
}

#[async_trait]
impl CaseStore for PgCaseStore {
    async fn get_case(&self, id: i64) -> Result<CaseRecord> {
        self.queries()
            .get_case_by_id(id)
            .await?
            .ok_or_else(|| CaseError::NotFound(format!("case {} not found", id)))
    }

    async fn insert_case(&self, new_case: NewCase) -> Result<CaseRecord> {
        self.queries().insert_case(&new_case).await
    }

    async fn update_plan(&self, id: i64, update: PlanUpdate) -> Result<CaseRecord> {
        self.queries().update_plan(id, &update).await
    }

    async fn update_status(
        &self,
        id: i64,
        expected: CaseStatus,
        new_status: CaseStatus,
    ) -> Result<CaseRecord> {
        self.queries().update_status(id, expected, new_status).await
    }

    async fn update_chart(
        &self,
        id: i64,
        tooth_status: BTreeMap<u8, ToothCondition>,
        ipr_data: BTreeMap<u8, IprEntry>,
    ) -> Result<CaseRecord> {
        self.queries()
            .update_chart(id, &tooth_status, &ipr_data)
            .await
    }

    async fn list_refinements(&self, parent_case_id: i64) -> Result<Vec<CaseRecord>> {
        self.queries().get_cases_by_parent_id(parent_case_id).await
    }

    async fn delete_case(&self, id: i64) -> Result<()> {
        self.queries().delete_case(id).await
    }
}

//! 内存记录存储
//!
//! 与 PostgreSQL 实现遵守相同的契约：条件写入、Conflict/NotFound
//! 语义一致。用于单元测试与演示程序，不做持久化。

use aligner_core::{
    CaseError, CaseRecord, CaseStatus, CaseStore, IprEntry, NewCase, PlanUpdate, Result,
    ToothCondition,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// 内存病例存储
pub struct MemoryCaseStore {
    cases: RwLock<BTreeMap<i64, CaseRecord>>,
    next_id: AtomicI64,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self {
            cases: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryCaseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn get_case(&self, id: i64) -> Result<CaseRecord> {
        let cases = self.cases.read().await;
        cases
            .get(&id)
            .cloned()
            .ok_or_else(|| CaseError::NotFound(format!("case {} not found", id)))
    }

    async fn insert_case(&self, new_case: NewCase) -> Result<CaseRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let record = CaseRecord {
            id,
            parent_case_id: new_case.parent_case_id,
            user_id: new_case.user_id,
            admin_id: new_case.admin_id,
            patient_first_name: new_case.patient_first_name,
            patient_last_name: new_case.patient_last_name,
            status: CaseStatus::Submitted,
            plan: new_case.plan,
            pricing: new_case.pricing,
            diagnosis: new_case.diagnosis,
            artifacts: new_case.artifacts,
            urgency: new_case.urgency,
            tooth_status: new_case.tooth_status,
            ipr_data: new_case.ipr_data,
            refinement_reason: new_case.refinement_reason,
            created_at: now,
            updated_at: now,
        };

        let mut cases = self.cases.write().await;
        cases.insert(id, record.clone());
        Ok(record)
    }

    async fn update_plan(&self, id: i64, update: PlanUpdate) -> Result<CaseRecord> {
        let mut cases = self.cases.write().await;
        let record = cases
            .get_mut(&id)
            .ok_or_else(|| CaseError::NotFound(format!("case {} not found", id)))?;

        if record.status.is_plan_locked() {
            return Err(CaseError::Conflict(format!(
                "plan fields of case {} are locked in status {}",
                id, record.status
            )));
        }

        update.apply(&mut record.plan, &mut record.pricing);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn update_status(
        &self,
        id: i64,
        expected: CaseStatus,
        new_status: CaseStatus,
    ) -> Result<CaseRecord> {
        let mut cases = self.cases.write().await;
        let record = cases
            .get_mut(&id)
            .ok_or_else(|| CaseError::NotFound(format!("case {} not found", id)))?;

        if record.status != expected {
            return Err(CaseError::Conflict(format!(
                "case {} expected status {} but found {}",
                id, expected, record.status
            )));
        }

        record.status = new_status;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn update_chart(
        &self,
        id: i64,
        tooth_status: BTreeMap<u8, ToothCondition>,
        ipr_data: BTreeMap<u8, IprEntry>,
    ) -> Result<CaseRecord> {
        let mut cases = self.cases.write().await;
        let record = cases
            .get_mut(&id)
            .ok_or_else(|| CaseError::NotFound(format!("case {} not found", id)))?;

        if record.status.is_plan_locked() {
            return Err(CaseError::Conflict(format!(
                "chart of case {} is locked in status {}",
                id, record.status
            )));
        }

        record.tooth_status = tooth_status;
        record.ipr_data = ipr_data;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_refinements(&self, parent_case_id: i64) -> Result<Vec<CaseRecord>> {
        let cases = self.cases.read().await;
        Ok(cases
            .values()
            .filter(|c| c.parent_case_id == Some(parent_case_id))
            .cloned()
            .collect())
    }

    async fn delete_case(&self, id: i64) -> Result<()> {
        let mut cases = self.cases.write().await;
        if cases.remove(&id).is_none() {
            return Err(CaseError::NotFound(format!("case {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_case() -> NewCase {
        NewCase {
            parent_case_id: None,
            user_id: Uuid::new_v4(),
            admin_id: None,
            patient_first_name: "Lin".to_string(),
            patient_last_name: "Wei".to_string(),
            plan: Default::default(),
            pricing: Default::default(),
            diagnosis: Default::default(),
            artifacts: Default::default(),
            urgency: Default::default(),
            tooth_status: BTreeMap::new(),
            ipr_data: BTreeMap::new(),
            refinement_reason: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_submitted_status() {
        let store = MemoryCaseStore::new();
        let first = store.insert_case(sample_case()).await.unwrap();
        let second = store.insert_case(sample_case()).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, CaseStatus::Submitted);

        let fetched = store.get_case(1).await.unwrap();
        assert_eq!(fetched.patient_first_name, "Lin");
    }

    #[tokio::test]
    async fn test_get_missing_case_returns_not_found() {
        let store = MemoryCaseStore::new();
        let err = store.get_case(99).await.unwrap_err();
        assert!(matches!(err, CaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_update_is_conditional() {
        let store = MemoryCaseStore::new();
        let case = store.insert_case(sample_case()).await.unwrap();

        let updated = store
            .update_status(case.id, CaseStatus::Submitted, CaseStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(updated.status, CaseStatus::Accepted);

        // 第二个写入者仍然基于 submitted 的旧快照
        let err = store
            .update_status(case.id, CaseStatus::Submitted, CaseStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Conflict(_)));

        let current = store.get_case(case.id).await.unwrap();
        assert_eq!(current.status, CaseStatus::Accepted);
    }

    #[tokio::test]
    async fn test_plan_update_rejected_when_locked() {
        let store = MemoryCaseStore::new();
        let case = store.insert_case(sample_case()).await.unwrap();
        store
            .update_status(case.id, CaseStatus::Submitted, CaseStatus::ReadyForDelivery)
            .await
            .unwrap();

        let update = PlanUpdate {
            case_study_fee: Some(dec!(120.00)),
            ..Default::default()
        };
        let err = store.update_plan(case.id, update).await.unwrap_err();
        assert!(matches!(err, CaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_chart_update_rejected_when_locked() {
        let store = MemoryCaseStore::new();
        let case = store.insert_case(sample_case()).await.unwrap();

        let mut ipr_data = BTreeMap::new();
        ipr_data.insert(
            8,
            IprEntry {
                mesial: dec!(0.25),
                distal: dec!(0.0),
            },
        );

        // 未锁定时图表可写入
        let updated = store
            .update_chart(case.id, BTreeMap::new(), ipr_data.clone())
            .await
            .unwrap();
        assert_eq!(updated.ipr_data.len(), 1);

        store
            .update_status(case.id, CaseStatus::Submitted, CaseStatus::Delivered)
            .await
            .unwrap();

        let err = store
            .update_chart(case.id, BTreeMap::new(), ipr_data)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_plan_update_applies_partial_fields() {
        let store = MemoryCaseStore::new();
        let case = store.insert_case(sample_case()).await.unwrap();

        let update = PlanUpdate {
            upper_aligner_count: Some(14),
            aligners_price: Some(dec!(800.00)),
            ..Default::default()
        };
        let updated = store.update_plan(case.id, update).await.unwrap();
        assert_eq!(updated.plan.upper_aligner_count, Some(14));
        assert_eq!(updated.pricing.aligners_price, dec!(800.00));
        assert_eq!(updated.pricing.total(), dec!(800.00));
    }

    #[tokio::test]
    async fn test_list_refinements_filters_by_parent() {
        let store = MemoryCaseStore::new();
        let parent = store.insert_case(sample_case()).await.unwrap();
        store.insert_case(sample_case()).await.unwrap();

        let mut child = sample_case();
        child.parent_case_id = Some(parent.id);
        child.refinement_reason = Some("relapse on lower arch".to_string());
        store.insert_case(child).await.unwrap();

        let refinements = store.list_refinements(parent.id).await.unwrap();
        assert_eq!(refinements.len(), 1);
        assert_eq!(refinements[0].parent_case_id, Some(parent.id));
    }

    #[tokio::test]
    async fn test_delete_case() {
        let store = MemoryCaseStore::new();
        let case = store.insert_case(sample_case()).await.unwrap();

        store.delete_case(case.id).await.unwrap();
        let err = store.get_case(case.id).await.unwrap_err();
        assert!(matches!(err, CaseError::NotFound(_)));

        let err = store.delete_case(case.id).await.unwrap_err();
        assert!(matches!(err, CaseError::NotFound(_)));
    }
}

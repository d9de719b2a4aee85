//! 再矫正子病例生成
//!
//! 针对已完成病例创建后续矫正病例：诊断与方案字段作为可编辑
//! 默认值带入，牙齿状态与 IPR 数据复制为起始快照，新病例以
//! submitted 状态重新进入状态机。

use aligner_core::{CaseArtifacts, CaseError, CaseRecord, CaseStatus, NewCase, Result, Urgency};

/// 病例是否满足申请再矫正的条件
pub fn refinement_eligible(status: CaseStatus) -> bool {
    matches!(status, CaseStatus::Completed)
}

/// 校验同一病例下不存在未终结的再矫正子病例
///
/// 同一时间最多允许一个进行中的再矫正。
pub fn ensure_no_active_refinement(parent_case_id: i64, existing: &[CaseRecord]) -> Result<()> {
    if let Some(active) = existing.iter().find(|child| !child.status.is_terminal()) {
        return Err(CaseError::Validation(format!(
            "case {} already has an active refinement (case {}, status {})",
            parent_case_id, active.id, active.status
        )));
    }
    Ok(())
}

/// 由原病例构造再矫正子病例的新建字段
///
/// 影像资料与加急信息不带入，需要为新病例重新提供。
pub fn build_refinement(parent: &CaseRecord, reason: &str) -> Result<NewCase> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CaseError::Validation(
            "refinement reason is required".to_string(),
        ));
    }
    if !refinement_eligible(parent.status) {
        return Err(CaseError::Validation(format!(
            "case {} in status {} is not eligible for refinement",
            parent.id, parent.status
        )));
    }

    Ok(NewCase {
        parent_case_id: Some(parent.id),
        user_id: parent.user_id,
        admin_id: None,
        patient_first_name: parent.patient_first_name.clone(),
        patient_last_name: parent.patient_last_name.clone(),
        plan: parent.plan.clone(),
        pricing: parent.pricing.clone(),
        diagnosis: parent.diagnosis.clone(),
        artifacts: CaseArtifacts::default(),
        urgency: Urgency::default(),
        tooth_status: parent.tooth_status.clone(),
        ipr_data: parent.ipr_data.clone(),
        refinement_reason: Some(reason.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aligner_core::{Diagnosis, IprEntry, PlanFields, Pricing, ToothCondition};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn completed_case(id: i64) -> CaseRecord {
        let mut tooth_status = BTreeMap::new();
        tooth_status.insert(14, ToothCondition::Missing);
        let mut ipr_data = BTreeMap::new();
        ipr_data.insert(
            8,
            IprEntry {
                mesial: dec!(0.3),
                distal: dec!(0.1),
            },
        );

        CaseRecord {
            id,
            parent_case_id: None,
            user_id: Uuid::new_v4(),
            admin_id: Some(Uuid::new_v4()),
            patient_first_name: "Jane".to_string(),
            patient_last_name: "Doe".to_string(),
            status: CaseStatus::Completed,
            plan: PlanFields {
                upper_aligner_count: Some(14),
                lower_aligner_count: Some(12),
                duration_months: Some(7),
                aligner_material: Some("premium".to_string()),
                treatment_arch: None,
            },
            pricing: Pricing {
                case_study_fee: dec!(100),
                aligners_price: dec!(1400),
                delivery_charges: dec!(30),
            },
            diagnosis: Diagnosis::default(),
            artifacts: CaseArtifacts::default(),
            urgency: Urgency::default(),
            tooth_status,
            ipr_data,
            refinement_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_refinement_carries_snapshot_of_parent() {
        let parent = completed_case(42);
        let new_case = build_refinement(&parent, "relapse on lower arch").unwrap();

        assert_eq!(new_case.parent_case_id, Some(42));
        assert_eq!(new_case.user_id, parent.user_id);
        assert_eq!(new_case.plan, parent.plan);
        assert_eq!(new_case.pricing, parent.pricing);
        assert_eq!(new_case.diagnosis, parent.diagnosis);
        assert_eq!(new_case.tooth_status, parent.tooth_status);
        assert_eq!(new_case.ipr_data, parent.ipr_data);
        assert_eq!(
            new_case.refinement_reason.as_deref(),
            Some("relapse on lower arch")
        );
        // 影像资料不带入
        assert_eq!(new_case.artifacts, CaseArtifacts::default());
    }

    #[test]
    fn test_blank_reason_is_rejected() {
        let parent = completed_case(42);
        assert!(matches!(
            build_refinement(&parent, "   "),
            Err(CaseError::Validation(_))
        ));
    }

    #[test]
    fn test_only_completed_cases_are_eligible() {
        let mut parent = completed_case(42);
        parent.status = CaseStatus::InProduction;
        assert!(build_refinement(&parent, "relapse").is_err());

        for status in CaseStatus::all() {
            assert_eq!(
                refinement_eligible(status),
                matches!(status, CaseStatus::Completed)
            );
        }
    }

    #[test]
    fn test_at_most_one_active_refinement() {
        let mut active_child = completed_case(43);
        active_child.parent_case_id = Some(42);
        active_child.status = CaseStatus::InProduction;

        let mut closed_child = completed_case(44);
        closed_child.parent_case_id = Some(42);
        closed_child.status = CaseStatus::Rejected;

        assert!(ensure_no_active_refinement(42, &[closed_child.clone()]).is_ok());
        assert!(ensure_no_active_refinement(42, &[closed_child, active_child]).is_err());
    }
}

//! 数据库模型
//!
//! 病例表行模型与领域模型之间的转换。状态与判别字段以字符串
//! 存储，诊断、牙齿状态、IPR 数据等结构化字段存为 JSONB。

use aligner_core::{
    CaseArtifacts, CaseError, CaseRecord, CaseStatus, Diagnosis, IprEntry, PlanFields, Pricing,
    ToothCondition, TreatmentArch, UploadMethod, Urgency,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// 数据库病例表行
#[derive(Debug, FromRow)]
pub struct DbCase {
    pub id: i64,
    pub parent_case_id: Option<i64>,
    pub user_id: Uuid,
    pub admin_id: Option<Uuid>,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub status: String, // 存储为字符串，转换为 CaseStatus 枚举
    pub upper_aligner_count: Option<i32>,
    pub lower_aligner_count: Option<i32>,
    pub duration_months: Option<i32>,
    pub aligner_material: Option<String>,
    pub treatment_arch: Option<String>,
    pub case_study_fee: Decimal,
    pub aligners_price: Decimal,
    pub delivery_charges: Decimal,
    pub total_cost: Decimal, // 冗余列，写入时恒等于三项之和
    pub diagnosis: Json<Diagnosis>,
    pub upload_method: Option<String>,
    pub upper_scan_path: Option<String>,
    pub lower_scan_path: Option<String>,
    pub bite_scan_path: Option<String>,
    pub archive_path: Option<String>,
    pub additional_paths: Json<Vec<String>>,
    pub is_urgent: bool,
    pub requested_delivery: Option<NaiveDate>,
    pub tooth_status: Json<BTreeMap<u8, ToothCondition>>,
    pub ipr_data: Json<BTreeMap<u8, IprEntry>>,
    pub refinement_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbCase> for CaseRecord {
    type Error = CaseError;

    fn try_from(row: DbCase) -> Result<Self, CaseError> {
        let status: CaseStatus = row.status.parse()?;
        let treatment_arch = row
            .treatment_arch
            .as_deref()
            .map(str::parse::<TreatmentArch>)
            .transpose()?;
        let upload_method = row
            .upload_method
            .as_deref()
            .map(str::parse::<UploadMethod>)
            .transpose()?;

        Ok(CaseRecord {
            id: row.id,
            parent_case_id: row.parent_case_id,
            user_id: row.user_id,
            admin_id: row.admin_id,
            patient_first_name: row.patient_first_name,
            patient_last_name: row.patient_last_name,
            status,
            plan: PlanFields {
                upper_aligner_count: row.upper_aligner_count,
                lower_aligner_count: row.lower_aligner_count,
                duration_months: row.duration_months,
                aligner_material: row.aligner_material,
                treatment_arch,
            },
            pricing: Pricing {
                case_study_fee: row.case_study_fee,
                aligners_price: row.aligners_price,
                delivery_charges: row.delivery_charges,
            },
            diagnosis: row.diagnosis.0,
            artifacts: CaseArtifacts {
                upload_method,
                upper_scan_path: row.upper_scan_path,
                lower_scan_path: row.lower_scan_path,
                bite_scan_path: row.bite_scan_path,
                archive_path: row.archive_path,
                additional_paths: row.additional_paths.0,
            },
            urgency: Urgency {
                is_urgent: row.is_urgent,
                requested_delivery: row.requested_delivery,
            },
            tooth_status: row.tooth_status.0,
            ipr_data: row.ipr_data.0,
            refinement_reason: row.refinement_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 锁定方案编辑的状态列表（SQL 条件用）
pub fn plan_locked_status_strings() -> Vec<String> {
    CaseStatus::plan_locked_statuses()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_status_strings() {
        let locked = plan_locked_status_strings();
        assert_eq!(
            locked,
            vec![
                "ready_for_delivery".to_string(),
                "delivered".to_string(),
                "completed".to_string()
            ]
        );
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("shipped".parse::<CaseStatus>().is_err());
        assert!("approved".parse::<CaseStatus>().is_ok());
    }
}

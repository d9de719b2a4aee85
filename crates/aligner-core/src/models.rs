//! 核心数据模型定义

use crate::error::{CaseError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 牙位编号范围（通用编号法，上颌 1-16，下颌 17-32）
pub const TOOTH_MIN: u8 = 1;
pub const TOOTH_MAX: u8 = 32;

/// 牙位编号是否有效
pub fn is_valid_tooth(tooth: u8) -> bool {
    (TOOTH_MIN..=TOOTH_MAX).contains(&tooth)
}

/// 操作角色
///
/// 所有核心调用都显式传入角色，不读取任何环境会话状态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// 审核运营方，制定方案并负责生产交付
    Operator,
    /// 提交病例的临床医生，确认或拒绝方案
    Clinician,
}

/// 病例状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Submitted,            // 已提交
    Accepted,             // 已受理
    Rejected,             // 运营方拒绝（终态）
    AwaitingUserApproval, // 等待医生确认方案
    UserRejected,         // 医生拒绝（终态）
    Approved,             // 方案已确认
    InProduction,         // 生产中
    ReadyForDelivery,     // 待发货
    Delivered,            // 已发货
    Completed,            // 已完成（终态）
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Submitted => "submitted",
            CaseStatus::Accepted => "accepted",
            CaseStatus::Rejected => "rejected",
            CaseStatus::AwaitingUserApproval => "awaiting_user_approval",
            CaseStatus::UserRejected => "user_rejected",
            CaseStatus::Approved => "approved",
            CaseStatus::InProduction => "in_production",
            CaseStatus::ReadyForDelivery => "ready_for_delivery",
            CaseStatus::Delivered => "delivered",
            CaseStatus::Completed => "completed",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::Rejected | CaseStatus::UserRejected | CaseStatus::Completed
        )
    }

    /// 方案数量字段是否处于锁定状态
    pub fn is_plan_locked(&self) -> bool {
        matches!(
            self,
            CaseStatus::ReadyForDelivery | CaseStatus::Delivered | CaseStatus::Completed
        )
    }

    /// 锁定方案编辑的状态集合
    pub fn plan_locked_statuses() -> [CaseStatus; 3] {
        [
            CaseStatus::ReadyForDelivery,
            CaseStatus::Delivered,
            CaseStatus::Completed,
        ]
    }

    /// 获取所有可能的状态
    pub fn all() -> [CaseStatus; 10] {
        [
            CaseStatus::Submitted,
            CaseStatus::Accepted,
            CaseStatus::Rejected,
            CaseStatus::AwaitingUserApproval,
            CaseStatus::UserRejected,
            CaseStatus::Approved,
            CaseStatus::InProduction,
            CaseStatus::ReadyForDelivery,
            CaseStatus::Delivered,
            CaseStatus::Completed,
        ]
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submitted" => Ok(CaseStatus::Submitted),
            "accepted" => Ok(CaseStatus::Accepted),
            "rejected" => Ok(CaseStatus::Rejected),
            "awaiting_user_approval" => Ok(CaseStatus::AwaitingUserApproval),
            "user_rejected" => Ok(CaseStatus::UserRejected),
            "approved" => Ok(CaseStatus::Approved),
            "in_production" => Ok(CaseStatus::InProduction),
            "ready_for_delivery" => Ok(CaseStatus::ReadyForDelivery),
            "delivered" => Ok(CaseStatus::Delivered),
            "completed" => Ok(CaseStatus::Completed),
            other => Err(CaseError::Internal(format!("unknown case status: {}", other))),
        }
    }
}

/// 治疗牙弓
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentArch {
    Upper,
    Lower,
    Both,
}

impl TreatmentArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentArch::Upper => "upper",
            TreatmentArch::Lower => "lower",
            TreatmentArch::Both => "both",
        }
    }
}

impl FromStr for TreatmentArch {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upper" => Ok(TreatmentArch::Upper),
            "lower" => Ok(TreatmentArch::Lower),
            "both" => Ok(TreatmentArch::Both),
            other => Err(CaseError::Internal(format!("unknown treatment arch: {}", other))),
        }
    }
}

/// 中线状态
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MidlineState {
    #[default]
    Centered,
    ShiftedRight,
    ShiftedLeft,
}

/// 中线诊断
///
/// 偏移量（毫米）当且仅当中线不居中时必填。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Midline {
    pub state: MidlineState,
    pub shift_mm: Option<Decimal>,
}

impl Midline {
    pub fn centered() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        match (self.state, self.shift_mm) {
            (MidlineState::Centered, Some(_)) => Err(CaseError::Validation(
                "midline shift magnitude must be absent when midline is centered".to_string(),
            )),
            (MidlineState::Centered, None) => Ok(()),
            (_, None) => Err(CaseError::Validation(
                "midline shift magnitude is required when midline is shifted".to_string(),
            )),
            (_, Some(shift)) if shift.is_sign_negative() => Err(CaseError::Validation(
                "midline shift magnitude must be non-negative".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// 咬合分类（安氏分类）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OcclusionClass {
    #[serde(rename = "class_i")]
    ClassI,
    #[serde(rename = "class_ii")]
    ClassII,
    #[serde(rename = "class_iii")]
    ClassIII,
}

/// 诊断字段
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub upper_midline: Midline,
    pub lower_midline: Midline,
    pub canine_left: Option<OcclusionClass>,
    pub canine_right: Option<OcclusionClass>,
    pub molar_left: Option<OcclusionClass>,
    pub molar_right: Option<OcclusionClass>,
}

impl Diagnosis {
    pub fn validate(&self) -> Result<()> {
        self.upper_midline.validate()?;
        self.lower_midline.validate()
    }
}

/// 方案字段
///
/// 仅在锁定策略允许时可修改，数量字段一旦设置必须为正。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanFields {
    pub upper_aligner_count: Option<i32>,
    pub lower_aligner_count: Option<i32>,
    pub duration_months: Option<i32>,
    pub aligner_material: Option<String>,
    pub treatment_arch: Option<TreatmentArch>,
}

impl PlanFields {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.upper_aligner_count, Some(n) if n <= 0) {
            return Err(CaseError::Validation(
                "upper aligner count must be positive".to_string(),
            ));
        }
        if matches!(self.lower_aligner_count, Some(n) if n <= 0) {
            return Err(CaseError::Validation(
                "lower aligner count must be positive".to_string(),
            ));
        }
        if matches!(self.duration_months, Some(n) if n <= 0) {
            return Err(CaseError::Validation(
                "estimated duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// 费用字段
///
/// 总价不单独存储，恒等于三项之和。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pricing {
    pub case_study_fee: Decimal,
    pub aligners_price: Decimal,
    pub delivery_charges: Decimal,
}

impl Pricing {
    /// 总价 = 分析费 + 矫正器费 + 运费
    pub fn total(&self) -> Decimal {
        self.case_study_fee + self.aligners_price + self.delivery_charges
    }

    pub fn validate(&self) -> Result<()> {
        if self.case_study_fee.is_sign_negative()
            || self.aligners_price.is_sign_negative()
            || self.delivery_charges.is_sign_negative()
        {
            return Err(CaseError::Validation(
                "pricing fields must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// 扫描件上传方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadMethod {
    IndividualScans,
    CompressedArchive,
}

impl UploadMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMethod::IndividualScans => "individual_scans",
            UploadMethod::CompressedArchive => "compressed_archive",
        }
    }
}

impl FromStr for UploadMethod {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "individual_scans" => Ok(UploadMethod::IndividualScans),
            "compressed_archive" => Ok(UploadMethod::CompressedArchive),
            other => Err(CaseError::Internal(format!("unknown upload method: {}", other))),
        }
    }
}

/// 病例影像资料引用
///
/// 核心只保存对象存储路径字符串，单独扫描件与压缩包二者互斥，
/// 由 upload_method 判别。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CaseArtifacts {
    pub upload_method: Option<UploadMethod>,
    pub upper_scan_path: Option<String>,
    pub lower_scan_path: Option<String>,
    pub bite_scan_path: Option<String>,
    pub archive_path: Option<String>,
    #[serde(default)]
    pub additional_paths: Vec<String>,
}

impl CaseArtifacts {
    fn has_individual_scans(&self) -> bool {
        self.upper_scan_path.is_some()
            || self.lower_scan_path.is_some()
            || self.bite_scan_path.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        match self.upload_method {
            None => {
                if self.has_individual_scans() || self.archive_path.is_some() {
                    return Err(CaseError::Validation(
                        "upload method is required when scan files are attached".to_string(),
                    ));
                }
            }
            Some(UploadMethod::IndividualScans) => {
                if self.archive_path.is_some() {
                    return Err(CaseError::Validation(
                        "archive path is not allowed with individual scans".to_string(),
                    ));
                }
            }
            Some(UploadMethod::CompressedArchive) => {
                if self.has_individual_scans() {
                    return Err(CaseError::Validation(
                        "individual scan paths are not allowed with a compressed archive"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 加急信息
///
/// 加急标记与期望交付日期必须同时出现。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Urgency {
    pub is_urgent: bool,
    pub requested_delivery: Option<NaiveDate>,
}

impl Urgency {
    pub fn validate(&self) -> Result<()> {
        match (self.is_urgent, self.requested_delivery) {
            (true, None) => Err(CaseError::Validation(
                "urgent cases require a requested delivery date".to_string(),
            )),
            (false, Some(_)) => Err(CaseError::Validation(
                "requested delivery date is only allowed on urgent cases".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// 牙齿临床状态
///
/// 仅用于图表着色，不参与推导。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToothCondition {
    Movable,
    Unmovable,
    Missing,
    ToBeExtracted,
}

/// 单颗牙齿的邻面去釉量（毫米，保留两位小数）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IprEntry {
    #[serde(default)]
    pub mesial: Decimal,
    #[serde(default)]
    pub distal: Decimal,
}

impl IprEntry {
    /// 近中与远中均为零，等同于未记录
    pub fn is_empty(&self) -> bool {
        self.mesial.is_zero() && self.distal.is_zero()
    }
}

/// 病例记录
///
/// 一次矫正治疗订单的持久化实体。状态始终存在；
/// 再矫正子病例通过 parent_case_id 指向原病例。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: i64,
    pub parent_case_id: Option<i64>,
    pub user_id: Uuid,
    pub admin_id: Option<Uuid>,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub status: CaseStatus,
    pub plan: PlanFields,
    pub pricing: Pricing,
    pub diagnosis: Diagnosis,
    pub artifacts: CaseArtifacts,
    pub urgency: Urgency,
    pub tooth_status: BTreeMap<u8, ToothCondition>,
    pub ipr_data: BTreeMap<u8, IprEntry>,
    pub refinement_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建病例的字段集合
///
/// ID 由记录存储分配，状态固定以 submitted 进入状态机。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCase {
    pub parent_case_id: Option<i64>,
    pub user_id: Uuid,
    pub admin_id: Option<Uuid>,
    pub patient_first_name: String,
    pub patient_last_name: String,
    #[serde(default)]
    pub plan: PlanFields,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub diagnosis: Diagnosis,
    #[serde(default)]
    pub artifacts: CaseArtifacts,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub tooth_status: BTreeMap<u8, ToothCondition>,
    #[serde(default)]
    pub ipr_data: BTreeMap<u8, IprEntry>,
    pub refinement_reason: Option<String>,
}

impl NewCase {
    pub fn validate(&self) -> Result<()> {
        if self.patient_first_name.trim().is_empty() || self.patient_last_name.trim().is_empty() {
            return Err(CaseError::Validation(
                "patient first and last name are required".to_string(),
            ));
        }
        self.plan.validate()?;
        self.pricing.validate()?;
        self.diagnosis.validate()?;
        self.artifacts.validate()?;
        self.urgency.validate()?;
        for tooth in self.tooth_status.keys().chain(self.ipr_data.keys()) {
            if !is_valid_tooth(*tooth) {
                return Err(CaseError::Validation(format!(
                    "invalid tooth number: {}",
                    tooth
                )));
            }
        }
        Ok(())
    }
}

/// 方案字段的部分更新
///
/// 未设置的字段保持原值；总价由存储层按三项之和重写。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanUpdate {
    pub upper_aligner_count: Option<i32>,
    pub lower_aligner_count: Option<i32>,
    pub duration_months: Option<i32>,
    pub aligner_material: Option<String>,
    pub treatment_arch: Option<TreatmentArch>,
    pub case_study_fee: Option<Decimal>,
    pub aligners_price: Option<Decimal>,
    pub delivery_charges: Option<Decimal>,
}

impl PlanUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.upper_aligner_count, Some(n) if n <= 0) {
            return Err(CaseError::Validation(
                "upper aligner count must be positive".to_string(),
            ));
        }
        if matches!(self.lower_aligner_count, Some(n) if n <= 0) {
            return Err(CaseError::Validation(
                "lower aligner count must be positive".to_string(),
            ));
        }
        if matches!(self.duration_months, Some(n) if n <= 0) {
            return Err(CaseError::Validation(
                "estimated duration must be positive".to_string(),
            ));
        }
        if matches!(&self.aligner_material, Some(m) if m.trim().is_empty()) {
            return Err(CaseError::Validation(
                "aligner material must not be blank".to_string(),
            ));
        }
        for amount in [
            self.case_study_fee,
            self.aligners_price,
            self.delivery_charges,
        ]
        .into_iter()
        .flatten()
        {
            if amount.is_sign_negative() {
                return Err(CaseError::Validation(
                    "pricing fields must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 将更新应用到方案与费用字段上
    pub fn apply(&self, plan: &mut PlanFields, pricing: &mut Pricing) {
        if let Some(n) = self.upper_aligner_count {
            plan.upper_aligner_count = Some(n);
        }
        if let Some(n) = self.lower_aligner_count {
            plan.lower_aligner_count = Some(n);
        }
        if let Some(n) = self.duration_months {
            plan.duration_months = Some(n);
        }
        if let Some(material) = &self.aligner_material {
            plan.aligner_material = Some(material.clone());
        }
        if let Some(arch) = self.treatment_arch {
            plan.treatment_arch = Some(arch);
        }
        if let Some(fee) = self.case_study_fee {
            pricing.case_study_fee = fee;
        }
        if let Some(price) = self.aligners_price {
            pricing.aligners_price = price;
        }
        if let Some(charges) = self.delivery_charges {
            pricing.delivery_charges = charges;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_new_case() -> NewCase {
        NewCase {
            parent_case_id: None,
            user_id: Uuid::new_v4(),
            admin_id: None,
            patient_first_name: "Jane".to_string(),
            patient_last_name: "Doe".to_string(),
            plan: PlanFields::default(),
            pricing: Pricing::default(),
            diagnosis: Diagnosis::default(),
            artifacts: CaseArtifacts::default(),
            urgency: Urgency::default(),
            tooth_status: BTreeMap::new(),
            ipr_data: BTreeMap::new(),
            refinement_reason: None,
        }
    }

    #[test]
    fn test_midline_shift_pairing() {
        let centered = Midline::centered();
        assert!(centered.validate().is_ok());

        let shifted_without_magnitude = Midline {
            state: MidlineState::ShiftedLeft,
            shift_mm: None,
        };
        assert!(shifted_without_magnitude.validate().is_err());

        let shifted = Midline {
            state: MidlineState::ShiftedRight,
            shift_mm: Some(dec!(1.5)),
        };
        assert!(shifted.validate().is_ok());

        let centered_with_magnitude = Midline {
            state: MidlineState::Centered,
            shift_mm: Some(dec!(0.5)),
        };
        assert!(centered_with_magnitude.validate().is_err());
    }

    #[test]
    fn test_pricing_total_is_sum_of_parts() {
        let pricing = Pricing {
            case_study_fee: dec!(100.00),
            aligners_price: dec!(1500.00),
            delivery_charges: dec!(25.50),
        };
        assert_eq!(pricing.total(), dec!(1625.50));
    }

    #[test]
    fn test_artifacts_upload_method_exclusivity() {
        let mut artifacts = CaseArtifacts {
            upload_method: Some(UploadMethod::CompressedArchive),
            archive_path: Some("cases/1/archive/scans.zip".to_string()),
            ..CaseArtifacts::default()
        };
        assert!(artifacts.validate().is_ok());

        artifacts.upper_scan_path = Some("cases/1/upper/scan.stl".to_string());
        assert!(artifacts.validate().is_err());

        let untagged = CaseArtifacts {
            upper_scan_path: Some("cases/1/upper/scan.stl".to_string()),
            ..CaseArtifacts::default()
        };
        assert!(untagged.validate().is_err());
    }

    #[test]
    fn test_urgency_requires_delivery_date() {
        let urgent_without_date = Urgency {
            is_urgent: true,
            requested_delivery: None,
        };
        assert!(urgent_without_date.validate().is_err());

        let date_without_flag = Urgency {
            is_urgent: false,
            requested_delivery: Some(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()),
        };
        assert!(date_without_flag.validate().is_err());

        let urgent = Urgency {
            is_urgent: true,
            requested_delivery: Some(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()),
        };
        assert!(urgent.validate().is_ok());
    }

    #[test]
    fn test_new_case_rejects_invalid_tooth_number() {
        let mut new_case = sample_new_case();
        new_case.tooth_status.insert(33, ToothCondition::Missing);
        assert!(new_case.validate().is_err());

        let mut new_case = sample_new_case();
        new_case.tooth_status.insert(16, ToothCondition::Missing);
        assert!(new_case.validate().is_ok());
    }

    #[test]
    fn test_plan_update_rejects_non_positive_counts() {
        let update = PlanUpdate {
            upper_aligner_count: Some(0),
            ..PlanUpdate::default()
        };
        assert!(update.validate().is_err());

        let update = PlanUpdate {
            upper_aligner_count: Some(12),
            delivery_charges: Some(dec!(-1)),
            ..PlanUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_plan_update_apply_preserves_unset_fields() {
        let mut plan = PlanFields {
            upper_aligner_count: Some(10),
            lower_aligner_count: Some(8),
            duration_months: Some(6),
            aligner_material: Some("standard".to_string()),
            treatment_arch: Some(TreatmentArch::Both),
        };
        let mut pricing = Pricing::default();

        let update = PlanUpdate {
            lower_aligner_count: Some(12),
            aligners_price: Some(dec!(1200)),
            ..PlanUpdate::default()
        };
        update.apply(&mut plan, &mut pricing);

        assert_eq!(plan.upper_aligner_count, Some(10));
        assert_eq!(plan.lower_aligner_count, Some(12));
        assert_eq!(pricing.aligners_price, dec!(1200));
        assert_eq!(pricing.case_study_fee, Decimal::ZERO);
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in CaseStatus::all() {
            assert_eq!(status.as_str().parse::<CaseStatus>().unwrap(), status);
        }
    }
}

//! 数据库查询操作
//!
//! 所有带业务条件的写入（状态转换、方案与图表更新）都实现为
//! 单条条件 UPDATE：WHERE 同时限定 id 与期望状态，行存在但条件
//! 不满足时返回 Conflict，避免并发操作者互相覆盖。

use crate::connection::DatabasePool;
use crate::models::{plan_locked_status_strings, DbCase};
use aligner_core::{
    CaseError, CaseRecord, CaseStatus, IprEntry, NewCase, PlanUpdate, Result, ToothCondition,
};
use sqlx::types::Json;
use std::collections::BTreeMap;

/// 数据库查询操作接口
pub struct CaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> CaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS cases (
                id BIGSERIAL PRIMARY KEY,
                parent_case_id BIGINT REFERENCES cases(id),
                user_id UUID NOT NULL,
                admin_id UUID,
                patient_first_name VARCHAR(255) NOT NULL,
                patient_last_name VARCHAR(255) NOT NULL,
                status VARCHAR(32) NOT NULL DEFAULT 'submitted',
                upper_aligner_count INTEGER,
                lower_aligner_count INTEGER,
                duration_months INTEGER,
                aligner_material VARCHAR(255),
                treatment_arch VARCHAR(8),
                case_study_fee NUMERIC(10,2) NOT NULL DEFAULT 0,
                aligners_price NUMERIC(10,2) NOT NULL DEFAULT 0,
                delivery_charges NUMERIC(10,2) NOT NULL DEFAULT 0,
                total_cost NUMERIC(10,2) NOT NULL DEFAULT 0,
                diagnosis JSONB NOT NULL DEFAULT '{}',
                upload_method VARCHAR(20),
                upper_scan_path VARCHAR(512),
                lower_scan_path VARCHAR(512),
                bite_scan_path VARCHAR(512),
                archive_path VARCHAR(512),
                additional_paths JSONB NOT NULL DEFAULT '[]',
                is_urgent BOOLEAN NOT NULL DEFAULT FALSE,
                requested_delivery DATE,
                tooth_status JSONB NOT NULL DEFAULT '{}',
                ipr_data JSONB NOT NULL DEFAULT '{}',
                refinement_reason TEXT,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| CaseError::Database(e.to_string()))?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_cases_user_id ON cases(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_cases_status ON cases(status)",
            "CREATE INDEX IF NOT EXISTS idx_cases_parent_case_id ON cases(parent_case_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| CaseError::Database(e.to_string()))?;
        }

        Ok(())
    }

    /// 创建新病例，状态固定为 submitted
    pub async fn insert_case(&self, new_case: &NewCase) -> Result<CaseRecord> {
        let pool = self.pool.pool();
        let total_cost = new_case.pricing.total();

        let row = sqlx::query_as::<_, DbCase>(r#"
            INSERT INTO cases (
                parent_case_id, user_id, admin_id,
                patient_first_name, patient_last_name, status,
                upper_aligner_count, lower_aligner_count, duration_months,
                aligner_material, treatment_arch,
                case_study_fee, aligners_price, delivery_charges, total_cost,
                diagnosis, upload_method,
                upper_scan_path, lower_scan_path, bite_scan_path, archive_path,
                additional_paths, is_urgent, requested_delivery,
                tooth_status, ipr_data, refinement_reason
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            RETURNING *
        "#)
        .bind(new_case.parent_case_id)
        .bind(new_case.user_id)
        .bind(new_case.admin_id)
        .bind(&new_case.patient_first_name)
        .bind(&new_case.patient_last_name)
        .bind(CaseStatus::Submitted.as_str())
        .bind(new_case.plan.upper_aligner_count)
        .bind(new_case.plan.lower_aligner_count)
        .bind(new_case.plan.duration_months)
        .bind(&new_case.plan.aligner_material)
        .bind(new_case.plan.treatment_arch.map(|a| a.as_str()))
        .bind(new_case.pricing.case_study_fee)
        .bind(new_case.pricing.aligners_price)
        .bind(new_case.pricing.delivery_charges)
        .bind(total_cost)
        .bind(Json(new_case.diagnosis.clone()))
        .bind(new_case.artifacts.upload_method.map(|m| m.as_str()))
        .bind(&new_case.artifacts.upper_scan_path)
        .bind(&new_case.artifacts.lower_scan_path)
        .bind(&new_case.artifacts.bite_scan_path)
        .bind(&new_case.artifacts.archive_path)
        .bind(Json(new_case.artifacts.additional_paths.clone()))
        .bind(new_case.urgency.is_urgent)
        .bind(new_case.urgency.requested_delivery)
        .bind(Json(new_case.tooth_status.clone()))
        .bind(Json(new_case.ipr_data.clone()))
        .bind(&new_case.refinement_reason)
        .fetch_one(pool)
        .await
        .map_err(|e| CaseError::Database(e.to_string()))?;

        row.try_into()
    }

    /// 根据 ID 查找病例
    pub async fn get_case_by_id(&self, id: i64) -> Result<Option<CaseRecord>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbCase>("SELECT * FROM cases WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| CaseError::Database(e.to_string()))?;

        result.map(CaseRecord::try_from).transpose()
    }

    /// 条件状态更新
    ///
    /// 仅当当前状态等于 expected 时生效，否则区分 NotFound 与 Conflict。
    pub async fn update_status(
        &self,
        id: i64,
        expected: CaseStatus,
        new_status: CaseStatus,
    ) -> Result<CaseRecord> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbCase>(r#"
            UPDATE cases
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
        "#)
        .bind(new_status.as_str())
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| CaseError::Database(e.to_string()))?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_case_by_id(id).await? {
                Some(current) => Err(CaseError::Conflict(format!(
                    "case {} expected status {} but found {}",
                    id, expected, current.status
                ))),
                None => Err(CaseError::NotFound(format!("case {} not found", id))),
            },
        }
    }

    /// 条件方案更新
    ///
    /// 未提供的字段保持原值，总价在同一条语句内按三项之和重写，
    /// 状态已锁定时整条更新不生效。
    pub async fn update_plan(&self, id: i64, update: &PlanUpdate) -> Result<CaseRecord> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbCase>(r#"
            UPDATE cases
            SET upper_aligner_count = COALESCE($1, upper_aligner_count),
                lower_aligner_count = COALESCE($2, lower_aligner_count),
                duration_months = COALESCE($3, duration_months),
                aligner_material = COALESCE($4, aligner_material),
                treatment_arch = COALESCE($5, treatment_arch),
                case_study_fee = COALESCE($6, case_study_fee),
                aligners_price = COALESCE($7, aligners_price),
                delivery_charges = COALESCE($8, delivery_charges),
                total_cost = COALESCE($6, case_study_fee)
                    + COALESCE($7, aligners_price)
                    + COALESCE($8, delivery_charges),
                updated_at = NOW()
            WHERE id = $9 AND status <> ALL($10)
            RETURNING *
        "#)
        .bind(update.upper_aligner_count)
        .bind(update.lower_aligner_count)
        .bind(update.duration_months)
        .bind(&update.aligner_material)
        .bind(update.treatment_arch.map(|a| a.as_str()))
        .bind(update.case_study_fee)
        .bind(update.aligners_price)
        .bind(update.delivery_charges)
        .bind(id)
        .bind(plan_locked_status_strings())
        .fetch_optional(pool)
        .await
        .map_err(|e| CaseError::Database(e.to_string()))?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_case_by_id(id).await? {
                Some(current) => Err(CaseError::Conflict(format!(
                    "plan fields of case {} are locked in status {}",
                    id, current.status
                ))),
                None => Err(CaseError::NotFound(format!("case {} not found", id))),
            },
        }
    }

    /// 条件图表更新（牙齿状态 + IPR 数据）
    pub async fn update_chart(
        &self,
        id: i64,
        tooth_status: &BTreeMap<u8, ToothCondition>,
        ipr_data: &BTreeMap<u8, IprEntry>,
    ) -> Result<CaseRecord> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbCase>(r#"
            UPDATE cases
            SET tooth_status = $1, ipr_data = $2, updated_at = NOW()
            WHERE id = $3 AND status <> ALL($4)
            RETURNING *
        "#)
        .bind(Json(tooth_status.clone()))
        .bind(Json(ipr_data.clone()))
        .bind(id)
        .bind(plan_locked_status_strings())
        .fetch_optional(pool)
        .await
        .map_err(|e| CaseError::Database(e.to_string()))?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_case_by_id(id).await? {
                Some(current) => Err(CaseError::Conflict(format!(
                    "chart of case {} is locked in status {}",
                    id, current.status
                ))),
                None => Err(CaseError::NotFound(format!("case {} not found", id))),
            },
        }
    }

    /// 列出某病例的全部再矫正子病例
    pub async fn get_cases_by_parent_id(&self, parent_case_id: i64) -> Result<Vec<CaseRecord>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbCase>(
            "SELECT * FROM cases WHERE parent_case_id = $1 ORDER BY created_at",
        )
        .bind(parent_case_id)
        .fetch_all(pool)
        .await
        .map_err(|e| CaseError::Database(e.to_string()))?;

        rows.into_iter().map(CaseRecord::try_from).collect()
    }

    /// 删除病例
    pub async fn delete_case(&self, id: i64) -> Result<()> {
        let pool = self.pool.pool();

        let result = sqlx::query("DELETE FROM cases WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| CaseError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CaseError::NotFound(format!("case {} not found", id)));
        }
        Ok(())
    }
}

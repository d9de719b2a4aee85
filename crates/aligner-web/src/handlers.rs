//! HTTP处理器
//!
//! 每个处理器只做参数提取与 JSON 组装，业务规则全部在工作流
//! 引擎与记录存储中。错误通过 ApiError 统一映射为 HTTP 状态码。

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use aligner_core::{ActorRole, CaseError, IprEntry, NewCase, PlanUpdate, ToothCondition};
use aligner_workflow::{ipr, CaseAction, Gap, Jaw};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::server::AppState;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Aligner Case API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

/// 创建病例
pub async fn create_case(
    State(state): State<AppState>,
    Json(new_case): Json<NewCase>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .engine
        .create_case(state.store.as_ref(), new_case)
        .await?;
    Ok(Json(json!({ "case": record })))
}

/// 查询单个病例
pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let record = state.store.get_case(case_id).await?;
    Ok(Json(json!({ "case": record })))
}

/// 删除病例，扫描件一并清理
///
/// 记录删除成功后，扫描件清理失败只记日志不影响响应，
/// 避免返回 500 时记录已不存在。
pub async fn delete_case(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_case(case_id).await?;
    if let Err(e) = state.storage.delete_case_files(case_id).await {
        tracing::warn!("Failed to remove scan files for case {}: {}", case_id, e);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ActionQueryParams {
    pub role: ActorRole,
}

/// 当前角色可执行的动作列表
pub async fn get_available_actions(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
    Query(params): Query<ActionQueryParams>,
) -> Result<Json<Value>, ApiError> {
    let record = state.store.get_case(case_id).await?;
    let actions = state.engine.list_available_actions(&record, params.role);
    Ok(Json(json!({
        "case_id": case_id,
        "status": record.status,
        "actions": actions
    })))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: CaseAction,
    pub role: ActorRole,
}

/// 执行一次状态转换
pub async fn transition_case(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .engine
        .apply_transition(state.store.as_ref(), case_id, request.action, request.role)
        .await?;
    Ok(Json(json!({ "case": record })))
}

/// 更新方案字段
pub async fn update_plan(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
    Json(update): Json<PlanUpdate>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .engine
        .update_plan(state.store.as_ref(), case_id, update)
        .await?;
    Ok(Json(json!({ "case": record })))
}

#[derive(Debug, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub tooth_status: BTreeMap<u8, ToothCondition>,
    #[serde(default)]
    pub ipr_data: BTreeMap<u8, IprEntry>,
}

/// 保存牙齿状态与 IPR 数据
pub async fn save_chart(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
    Json(request): Json<ChartRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .engine
        .save_ipr_chart(
            state.store.as_ref(),
            case_id,
            request.tooth_status,
            request.ipr_data,
        )
        .await?;
    Ok(Json(json!({ "case": record })))
}

/// 查询 IPR 图表的推导视图
///
/// 按展示顺序返回每侧牙弓的间隙值，未记录的间隙值为 null。
pub async fn get_chart(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let record = state.store.get_case(case_id).await?;
    let upper = derived_jaw_view(&record.ipr_data, Jaw::Upper)?;
    let lower = derived_jaw_view(&record.ipr_data, Jaw::Lower)?;
    Ok(Json(json!({
        "case_id": case_id,
        "tooth_status": record.tooth_status,
        "ipr_data": record.ipr_data,
        "gaps": {
            "upper": upper,
            "lower": lower
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct RefinementRequest {
    pub reason: String,
}

/// 申请再矫正
pub async fn request_refinement(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
    Json(request): Json<RefinementRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .engine
        .request_refinement(state.store.as_ref(), case_id, &request.reason)
        .await?;
    Ok(Json(json!({ "case": record })))
}

/// 列出再矫正子病例
pub async fn list_refinements(
    State(state): State<AppState>,
    Path(case_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let refinements = state.store.list_refinements(case_id).await?;
    let total = refinements.len();
    Ok(Json(json!({
        "case_id": case_id,
        "refinements": refinements,
        "total": total
    })))
}

fn derived_jaw_view(chart: &BTreeMap<u8, IprEntry>, jaw: Jaw) -> Result<Vec<Value>, ApiError> {
    let mut view = Vec::with_capacity(17);
    for gap in ipr::display_gaps(jaw) {
        let value = ipr::derive(chart, gap)?;
        let label = match gap {
            Gap::Edge(tooth) => format!("edge_{}", tooth),
            Gap::Between(a, b) => format!("{}_{}", a, b),
        };
        view.push(json!({ "gap": label, "value": value }));
    }
    Ok(view)
}

/// 错误到 HTTP 状态码的映射
#[derive(Debug)]
pub struct ApiError(CaseError);

impl From<CaseError> for ApiError {
    fn from(err: CaseError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CaseError::NotFound(_) => StatusCode::NOT_FOUND,
            CaseError::Validation(_) => StatusCode::BAD_REQUEST,
            CaseError::Conflict(_) => StatusCode::CONFLICT,
            CaseError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

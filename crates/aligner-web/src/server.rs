//! Web服务器

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use aligner_core::{CaseStore, Result};
use aligner_storage::ScanStorage;
use aligner_workflow::CaseWorkflowEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    api_root, create_case, delete_case, get_available_actions, get_case, get_chart, health,
    list_refinements, request_refinement, save_chart, transition_case, update_plan,
};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CaseWorkflowEngine>,
    pub store: Arc<dyn CaseStore>,
    pub storage: Arc<ScanStorage>,
}

impl AppState {
    pub fn new(
        engine: Arc<CaseWorkflowEngine>,
        store: Arc<dyn CaseStore>,
        storage: Arc<ScanStorage>,
    ) -> Self {
        Self {
            engine,
            store,
            storage,
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = create_app(state);
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| aligner_core::CaseError::Internal(format!(
                "Failed to start web server: {}",
                e
            )))?;

        Ok(())
    }
}

/// 构建完整路由
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // 根路径
        .route("/", get(api_root))
        // 健康检查
        .route("/health", get(health))
        // API路由
        .nest("/api/v1", api_routes())
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cases", post(create_case))
        .route("/cases/:id", get(get_case))
        .route("/cases/:id", delete(delete_case))
        .route("/cases/:id/actions", get(get_available_actions))
        .route("/cases/:id/transition", post(transition_case))
        .route("/cases/:id/plan", put(update_plan))
        .route("/cases/:id/chart", get(get_chart))
        .route("/cases/:id/chart", put(save_chart))
        .route("/cases/:id/refinements", get(list_refinements))
        .route("/cases/:id/refinements", post(request_refinement))
}

//! 矫正器病例服务器主程序

mod config;

use aligner_core::Result;
use aligner_database::{CaseQueries, DatabasePool, PgCaseStore};
use aligner_storage::ScanStorage;
use aligner_web::{AppState, WebServer};
use aligner_workflow::CaseWorkflowEngine;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 病例服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "aligner-server")]
#[command(about = "隐形矫正器病例管理服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听主机，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .init();

    info!("启动病例服务器...");

    let mut app_config = config::load_config(args.config.as_deref())
        .map_err(|e| aligner_core::CaseError::Config(e.to_string()))?;
    if let Some(host) = args.host {
        app_config.server.host = host;
    }
    if let Some(port) = args.port {
        app_config.server.port = port;
    }

    info!("病例服务器配置:");
    info!("  监听地址: {}:{}", app_config.server.host, app_config.server.port);
    info!("  扫描件目录: {}", app_config.storage.base_path);

    // 建立数据库连接并初始化表结构
    let pool = DatabasePool::connect(
        &app_config.database.url,
        app_config.database.max_connections,
        Duration::from_secs(app_config.database.connect_timeout_secs),
    )
    .await?;
    CaseQueries::new(&pool).create_tables().await?;

    let store = Arc::new(PgCaseStore::new(pool));
    let engine = Arc::new(CaseWorkflowEngine::new());
    let storage = Arc::new(ScanStorage::new(&app_config.storage.base_path));
    let state = AppState::new(engine, store, storage);

    let addr: SocketAddr = format!("{}:{}", app_config.server.host, app_config.server.port)
        .parse()
        .map_err(|e| aligner_core::CaseError::Config(format!("invalid listen address: {}", e)))?;

    let server = WebServer::new(addr, state);
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}

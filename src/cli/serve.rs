use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tracing::{info, warn};
use trafficguard_core_types::ServerName;
use trafficguard_interceptor::GuardBootstrap;
use trafficguard_policy_center::{SyncBootstrap, SyncOptions};

use super::context::CliContext;
use crate::metrics;
use crate::server::{build_router, ServeState};

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Listen address, overrides the config file
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Logical server name, overrides the guard settings
    #[arg(long)]
    pub server_name: Option<String>,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let mut settings = ctx.settings()?;
    if let Some(name) = args.server_name {
        settings.server_name = name;
    }
    let server_name = ServerName::parse(&settings.server_name)
        .context("server_name must be set in the guard settings or with --server-name")?;

    let store_config = &ctx.config().store;
    let store = store_config.build(&server_name).await?;
    let sync = SyncBootstrap::new(server_name.as_str())
        .with_store(store)
        .with_sign_config(settings.sign.clone())
        .with_options(SyncOptions::from(&settings))
        .start()
        .await
        .context("failed to initialise interception config")?;
    let sync = Arc::new(sync);

    let _metrics_server = metrics::spawn_metrics_server(ctx.metrics_port());
    metrics::register_metrics();

    let guard = GuardBootstrap::new(sync.center()).build();
    let router = build_router(ServeState::new(Arc::clone(&sync), store_config.kind()), guard);

    let addr = args.listen.unwrap_or(ctx.config().listen);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind guard listener on {}", addr))?;
    info!(
        %addr,
        server = %server_name,
        store = store_config.kind(),
        signing = settings.sign.is_active(),
        config = %ctx.config_path().display(),
        "trafficguard listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("guard listener exited unexpectedly")?;

    sync.shutdown().await;
    info!("policy synchronizer stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

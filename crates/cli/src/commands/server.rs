//! `ferriclaw server` - the full runtime: agent loop drain, heartbeat,
//! and the REST API, shut down together on ctrl-c.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ferriclaw_agent::HeartbeatRunner;
use ferriclaw_config::AppConfig;
use ferriclaw_server::ServerState;

use crate::app;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.api.port = port;
    }

    let host = config.api.host.clone();
    let port = config.api.port;
    let heartbeat_config = config.heartbeat.clone();
    let workspace = config.workspace_path();

    let app = app::build(config)?;
    let cancel = CancellationToken::new();

    println!("ferriclaw server v{}", env!("CARGO_PKG_VERSION"));
    println!("  model:     {}", app.agent.model());
    println!("  tools:     {}", app.agent.tools_loaded());
    println!("  skills:    {}", app.skills.list().len());
    println!("  listening: {host}:{port}");
    println!("Press ctrl-c to stop");

    // Agent loop drain.
    let agent_task = {
        let agent = app.agent.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { agent.run(cancel).await })
    };

    // Heartbeat runner.
    let heartbeat_task = {
        let runner = HeartbeatRunner::new(
            &workspace,
            heartbeat_config.interval_minutes,
            heartbeat_config.enabled,
            app.agent.clone(),
            app.bus.clone(),
        );
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(cancel).await })
    };

    // Graceful shutdown on ctrl-c.
    {
        let cancel = cancel.clone();
        let bus = app.bus.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                bus.shutdown();
                cancel.cancel();
            }
        });
    }

    let state = ServerState::new(
        app.agent.clone(),
        app.swarm.clone(),
        app.bus.clone(),
        app.skills.clone(),
    );
    ferriclaw_server::serve(state, &host, port, cancel.clone()).await?;

    cancel.cancel();
    let _ = agent_task.await;
    let _ = heartbeat_task.await;
    println!("Server stopped");
    Ok(())
}

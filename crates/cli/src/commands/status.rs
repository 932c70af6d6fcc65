//! `ferriclaw status` - configuration overview.

use ferriclaw_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::default_path();
    let config = AppConfig::load()?;
    let workspace = config.workspace_path();

    println!("ferriclaw v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() { "ok" } else { "missing" }
    );
    println!(
        "Workspace: {} {}",
        workspace.display(),
        if workspace.exists() { "ok" } else { "missing" }
    );
    println!("Model:     {}", config.provider.model);
    println!("Provider:  {} ({})", config.provider.name, config.provider.api_base);
    println!(
        "API key:   {}",
        if config.provider.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!("API bind:  {}:{}", config.api.host, config.api.port);
    println!(
        "Heartbeat: {} (every {} min)",
        if config.heartbeat.enabled { "enabled" } else { "disabled" },
        config.heartbeat.interval_minutes
    );
    Ok(())
}

//! `ferriclaw onboard` - initialize config and workspace templates.

use ferriclaw_config::AppConfig;

const IDENTITY_TEMPLATE: &str = "# Agent\n\nYou are Ferriclaw, an autonomous assistant.\n\
Use your tools to get things done, and keep answers short.\n";

const BEHAVIOR_TEMPLATE: &str = "Be direct. Prefer acting over asking.\n\
When a task will take a while, spawn a subagent and keep the user posted.\n";

const HEARTBEAT_TEMPLATE: &str = "# Heartbeat Checklist\n\n\
- [ ] Review open tasks\n";

const MEMORY_TEMPLATE: &str = "# Long-term Memory\n";

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::default_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = AppConfig::default();
        config.save_to(&config_path)?;
        println!("Wrote config to {}", config_path.display());
    }

    let config = AppConfig::load()?;
    let workspace = config.workspace_path();
    std::fs::create_dir_all(workspace.join("memory"))?;
    std::fs::create_dir_all(workspace.join("skills"))?;

    for (name, content) in [
        ("AGENTS.md", IDENTITY_TEMPLATE),
        ("SOUL.md", BEHAVIOR_TEMPLATE),
        ("HEARTBEAT.md", HEARTBEAT_TEMPLATE),
        ("memory/MEMORY.md", MEMORY_TEMPLATE),
    ] {
        let path = workspace.join(name);
        if !path.exists() {
            std::fs::write(&path, content)?;
        }
    }

    println!("ferriclaw is ready.");
    println!();
    println!("Next steps:");
    println!("  1. Add your API key to {}", config_path.display());
    println!("     (or set FERRICLAW_API_KEY)");
    println!("  2. Chat: ferriclaw agent -m \"Hello!\"");
    Ok(())
}

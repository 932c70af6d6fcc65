//! Application wiring: one place that assembles the bus, provider,
//! knowledge store, tool registry, swarm, and agent loop from config.

use std::sync::Arc;

use ferriclaw_agent::{AgentLoop, AgentLoopConfig, SkillCatalog};
use ferriclaw_config::AppConfig;
use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::provider::{LlmOptions, LlmProvider};
use ferriclaw_knowledge::{ChunkerConfig, Store};
use ferriclaw_providers::OpenAiCompatProvider;
use ferriclaw_swarm::{DelegateTaskTool, SpawnAgentTool, SwarmManager, SwarmTool};

pub struct App {
    pub config: AppConfig,
    pub bus: Arc<MessageBus>,
    pub agent: Arc<AgentLoop>,
    pub swarm: Arc<SwarmManager>,
    pub skills: Arc<SkillCatalog>,
    pub store: Arc<Store>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

pub fn build(config: AppConfig) -> Result<App, Box<dyn std::error::Error>> {
    let workspace = config.workspace_path();
    std::fs::create_dir_all(&workspace)?;

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::new(
        config.provider.name.clone(),
        config.provider.api_base.clone(),
        config.provider.api_key.clone().unwrap_or_default(),
    )?);

    let bus = Arc::new(MessageBus::new());

    let chunker = ChunkerConfig::new(config.knowledge.chunk_size, config.knowledge.chunk_overlap)?;
    let store = Arc::new(Store::new(workspace.join("memory").join("knowledge"), chunker)?);

    let swarm = Arc::new(SwarmManager::new(
        provider.clone(),
        config.provider.model.clone(),
        bus.clone(),
        config.swarm.max_iterations,
    ));

    let mut registry =
        ferriclaw_tools::baseline_registry(store.clone(), bus.clone(), workspace.clone());
    registry.register(Box::new(SpawnAgentTool::new(swarm.clone())));
    registry.register(Box::new(DelegateTaskTool::new(swarm.clone())));
    registry.register(Box::new(SwarmTool::new(swarm.clone())));
    let registry = Arc::new(registry);
    swarm.set_registry(registry.clone());

    let agent = Arc::new(AgentLoop::new(
        AgentLoopConfig {
            model: config.provider.model.clone(),
            max_iterations: config.agent.max_iterations,
            session_cap: config.agent.session_cap,
            options: LlmOptions {
                temperature: config.provider.temperature,
                max_tokens: config.provider.max_tokens,
            },
        },
        provider,
        registry,
        bus.clone(),
        &workspace,
    ));

    let skills = Arc::new(SkillCatalog::new(&workspace));

    Ok(App {
        config,
        bus,
        agent,
        swarm,
        skills,
        store,
    })
}

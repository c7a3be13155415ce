use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::agent::claude::ClaudeClient;
use crate::agent::definition::AgentCatalog;
use crate::agent::functions::FunctionRegistry;
use crate::agent::orchestrator::AgentOrchestrator;
use crate::chat::slack::SlackClient;
use crate::config::AppConfig;
use crate::platform::github::GitHubPlatform;
use crate::platform::GitHubOperations;
use crate::queue::dedup::DedupSet;
use crate::queue::ConversationQueue;
use crate::workflow::{WorkflowEnforcer, WorkflowStateTracker};

pub struct AppState {
    pub config: AppConfig,
    pub tracker: Arc<WorkflowStateTracker>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub queue: ConversationQueue<AgentOrchestrator>,
    pub dedup: DedupSet,
}

impl AppState {
    pub fn new(config: AppConfig) -> crate::error::Result<Self> {
        let platform: Arc<dyn GitHubOperations> = Arc::new(GitHubPlatform::new(&config.github)?);
        let tracker = Arc::new(WorkflowStateTracker::new());
        let registry = Arc::new(FunctionRegistry::with_github(
            Arc::clone(&platform),
            Arc::clone(&tracker),
        ));

        let repo_full_name = format!("{}/{}", config.github.owner, config.github.repo);
        let catalog = Arc::new(AgentCatalog::load(&config.agent, &registry, &repo_full_name)?);

        let enforcer = Arc::new(WorkflowEnforcer::new(
            registry,
            platform,
            Arc::clone(&tracker),
        ));
        let llm = Arc::new(ClaudeClient::new(
            config.claude_api_key(),
            &config.claude.model,
            config.claude.max_tokens,
        ));
        let chat = Arc::new(SlackClient::new(&config.slack.bot_token));

        let orchestrator = Arc::new(AgentOrchestrator::new(
            catalog,
            llm,
            enforcer,
            chat,
            config.agent.max_history_messages,
        ));
        let queue = ConversationQueue::new(Arc::clone(&orchestrator));
        let dedup = DedupSet::new(config.slack.dedup_capacity);

        Ok(Self {
            config,
            tracker,
            orchestrator,
            queue,
            dedup,
        })
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slack/events", post(crate::webhook::handler::handle_slack_event))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

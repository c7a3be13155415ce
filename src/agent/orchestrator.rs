use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::agent::definition::{AgentCatalog, AgentDefinition};
use crate::agent::{prompt, HistoryEntry, LanguageModel};
use crate::chat::{ChatTransport, InboundMessage, OutboundMessage};
use crate::workflow::{CallOutcome, FunctionCall, FunctionCallRecord, WorkflowEnforcer};

/// Conversations whose history is kept; the least recently active is dropped first.
pub const MAX_TRACKED_CONVERSATIONS: usize = 1_000;

/// What one agent did in response to one message.
#[derive(Debug)]
pub struct TurnOutcome {
    pub agent_id: String,
    pub records: Vec<FunctionCallRecord>,
    /// Text posted back to the channel.
    pub reply: String,
}

/// Routes chat messages to agents and runs their function calls through the
/// workflow enforcer.
pub struct AgentOrchestrator {
    catalog: Arc<AgentCatalog>,
    llm: Arc<dyn LanguageModel>,
    enforcer: Arc<WorkflowEnforcer>,
    chat: Arc<dyn ChatTransport>,
    /// Keyed by workflow key, oldest entry first.
    history: Mutex<LruCache<String, VecDeque<HistoryEntry>>>,
    max_history: usize,
}

impl AgentOrchestrator {
    pub fn new(
        catalog: Arc<AgentCatalog>,
        llm: Arc<dyn LanguageModel>,
        enforcer: Arc<WorkflowEnforcer>,
        chat: Arc<dyn ChatTransport>,
        max_history: usize,
    ) -> Self {
        Self::with_history_capacity(
            catalog,
            llm,
            enforcer,
            chat,
            max_history,
            MAX_TRACKED_CONVERSATIONS,
        )
    }

    pub fn with_history_capacity(
        catalog: Arc<AgentCatalog>,
        llm: Arc<dyn LanguageModel>,
        enforcer: Arc<WorkflowEnforcer>,
        chat: Arc<dyn ChatTransport>,
        max_history: usize,
        conversations: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(conversations).unwrap_or(NonZeroUsize::MIN);
        Self {
            catalog,
            llm,
            enforcer,
            chat,
            history: Mutex::new(LruCache::new(capacity)),
            max_history,
        }
    }

    pub fn catalog(&self) -> &Arc<AgentCatalog> {
        &self.catalog
    }

    /// Let every mentioned agent take a turn, one after the other.
    pub async fn handle_message(&self, message: &InboundMessage) -> Vec<TurnOutcome> {
        let mut outcomes = Vec::with_capacity(message.mentions.len());

        for agent_id in &message.mentions {
            let Some(agent) = self.catalog.get(agent_id) else {
                tracing::warn!(agent = %agent_id, "Message mentions an unknown agent, skipping");
                continue;
            };
            outcomes.push(self.run_turn(agent, message).await);
        }

        outcomes
    }

    async fn run_turn(&self, agent: &AgentDefinition, message: &InboundMessage) -> TurnOutcome {
        let key = message.workflow_key(&agent.id);
        let enhanced = prompt::enhance_message(&message.content);
        let history = self.history_for(&key);

        tracing::info!(
            key = %key,
            agent = %agent.id,
            sender = %message.sender_id,
            history = history.len(),
            "Agent turn"
        );

        let response = match self.llm.generate_response(agent, &enhanced, &history).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(key = %key, agent = %agent.id, error = %e, "Language model call failed");
                let reply = format!(
                    "*{}*: Sorry, I couldn't process that request ({e}).",
                    agent.name
                );
                self.post(message, &reply).await;
                return TurnOutcome {
                    agent_id: agent.id.clone(),
                    records: Vec::new(),
                    reply,
                };
            }
        };

        let records = self.execute_calls(agent, &key, response.function_calls).await;

        let body = compose_body(&response.text, &records);
        let reply = format!("*{}*: {body}", agent.name);
        self.post(message, &reply).await;

        self.remember(&key, HistoryEntry::user(message.content.clone()));
        self.remember(&key, HistoryEntry::assistant(body));

        TurnOutcome {
            agent_id: agent.id.clone(),
            records,
            reply,
        }
    }

    /// Run the calls in order, refusing any function outside the agent's list.
    async fn execute_calls(
        &self,
        agent: &AgentDefinition,
        key: &str,
        calls: Vec<FunctionCall>,
    ) -> Vec<FunctionCallRecord> {
        let mut records = Vec::with_capacity(calls.len());
        for call in calls {
            if agent.allows(&call.name) {
                records.push(self.enforcer.execute(key, call).await);
                continue;
            }

            tracing::warn!(
                key,
                agent = %agent.id,
                function = %call.name,
                "Function not available to agent"
            );
            let error = format!(
                "Function '{}' is not available to agent '{}'",
                call.name, agent.id
            );
            records.push(call.with_result(CallOutcome::Rejected { error }));
        }
        records
    }

    async fn post(&self, message: &InboundMessage, text: &str) {
        let outbound = OutboundMessage {
            channel: message.channel.clone(),
            text: text.to_string(),
            thread_id: Some(message.thread().to_string()),
        };

        if let Err(e) = self.chat.post_message(&outbound).await {
            tracing::error!(
                channel = %message.channel,
                thread = %message.thread(),
                error = %e,
                "Failed to post reply"
            );
        }
    }

    fn history_for(&self, key: &str) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .get(key)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn remember(&self, key: &str, entry: HistoryEntry) {
        let mut history = self.history.lock();
        let entries = history.get_or_insert_mut(key.to_string(), VecDeque::new);
        entries.push_back(entry);
        while entries.len() > self.max_history {
            entries.pop_front();
        }
    }
}

/// Model text followed by one line per function call result.
fn compose_body(text: &str, records: &[FunctionCallRecord]) -> String {
    let mut body = text.trim().to_string();

    if !records.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str("Function results:");
        for record in records {
            body.push('\n');
            body.push_str(&record.summary());
        }
    }

    if body.is_empty() {
        body.push_str("(no response)");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::functions::{FunctionRegistry, CREATE_BRANCH, CREATE_COMMIT, GET_ISSUE};
    use crate::platform::GitHubOperations;
    use crate::test_support::{FakeChat, FakeGitHub, FakeLanguageModel};
    use crate::workflow::{FunctionCall, WorkflowStateTracker, WorkflowStep};
    use serde_json::json;

    struct Harness {
        orchestrator: AgentOrchestrator,
        github: Arc<FakeGitHub>,
        llm: Arc<FakeLanguageModel>,
        chat: Arc<FakeChat>,
        tracker: Arc<WorkflowStateTracker>,
    }

    fn harness(llm: FakeLanguageModel, chat: FakeChat, max_history: usize) -> Harness {
        harness_with_capacity(llm, chat, max_history, MAX_TRACKED_CONVERSATIONS)
    }

    fn harness_with_capacity(
        llm: FakeLanguageModel,
        chat: FakeChat,
        max_history: usize,
        conversations: usize,
    ) -> Harness {
        let github = Arc::new(FakeGitHub::new());
        let llm = Arc::new(llm);
        let chat = Arc::new(chat);
        let tracker = Arc::new(WorkflowStateTracker::new());

        let platform: Arc<dyn GitHubOperations> = github.clone();
        let registry = Arc::new(FunctionRegistry::with_github(
            Arc::clone(&platform),
            Arc::clone(&tracker),
        ));
        let agent = |id: &str, name: &str| AgentDefinition {
            id: id.to_string(),
            name: name.to_string(),
            system_prompt: String::new(),
            functions: registry.schemas(),
        };
        let triage = AgentDefinition {
            functions: vec![registry.schema(GET_ISSUE).unwrap()],
            ..agent("triage", "Triage")
        };
        let catalog = Arc::new(
            AgentCatalog::new(
                vec![agent("developer", "Developer"), agent("reviewer", "Reviewer"), triage],
                "developer",
            )
            .unwrap(),
        );
        let enforcer = Arc::new(WorkflowEnforcer::new(
            registry,
            platform,
            Arc::clone(&tracker),
        ));

        Harness {
            orchestrator: AgentOrchestrator::with_history_capacity(
                catalog,
                llm.clone(),
                enforcer,
                chat.clone(),
                max_history,
                conversations,
            ),
            github,
            llm,
            chat,
            tracker,
        }
    }

    fn message(ts: &str, content: &str, mentions: &[&str], reply_to: Option<&str>) -> InboundMessage {
        InboundMessage {
            id: format!("C1:{ts}"),
            timestamp: ts.to_string(),
            sender_id: "U1".to_string(),
            content: content.to_string(),
            channel: "C1".to_string(),
            mentions: mentions.iter().map(|m| m.to_string()).collect(),
            reply_to: reply_to.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_turn_runs_calls_and_posts_threaded_reply() {
        let llm = FakeLanguageModel::new().respond(
            "On it.",
            vec![
                FunctionCall::new(GET_ISSUE, json!({ "number": 42 })),
                FunctionCall::new(CREATE_BRANCH, json!({ "name": "feature-42" })),
            ],
        );
        let h = harness(llm, FakeChat::new(), 20);

        let msg = message("100.1", "@developer implement #42", &["developer"], None);
        let outcomes = h.orchestrator.handle_message(&msg).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].records.len(), 2);

        let requests = h.llm.requests();
        assert!(requests[0].message.contains("Call getIssue with number 42"));

        let posted = h.chat.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].channel, "C1");
        assert_eq!(posted[0].thread_id.as_deref(), Some("100.1"));
        assert!(posted[0].text.starts_with("*Developer*: On it."));
        assert!(posted[0].text.contains("Function results:\n✅ getIssue"));

        let state = h.tracker.get_state("C1:100.1:developer");
        assert_eq!(state.last_completed_step, WorkflowStep::BranchCreated);
    }

    #[tokio::test]
    async fn test_rejection_is_reported_back() {
        let llm = FakeLanguageModel::new().respond(
            "",
            vec![FunctionCall::new(
                CREATE_COMMIT,
                json!({
                    "message": "m",
                    "branch": "feature-1",
                    "files": [{ "path": "a.txt", "content": "a" }]
                }),
            )],
        );
        let h = harness(llm, FakeChat::new(), 20);

        let outcomes = h
            .orchestrator
            .handle_message(&message("100.1", "@developer commit", &["developer"], None))
            .await;

        assert!(outcomes[0].reply.contains("⚠️ createCommit"));
        assert!(outcomes[0].reply.contains("call createBranch first"));
        assert_eq!(h.github.count("create_commit"), 0);
    }

    #[tokio::test]
    async fn test_history_is_replayed_within_thread() {
        let llm = FakeLanguageModel::new()
            .respond("first", Vec::new())
            .respond("second", Vec::new());
        let h = harness(llm, FakeChat::new(), 20);

        h.orchestrator
            .handle_message(&message("100.1", "hello", &["developer"], None))
            .await;
        h.orchestrator
            .handle_message(&message("100.2", "again", &["developer"], Some("100.1")))
            .await;

        let requests = h.llm.requests();
        assert!(requests[0].history.is_empty());
        assert_eq!(
            requests[1].history,
            vec![HistoryEntry::user("hello"), HistoryEntry::assistant("first")]
        );
        assert_eq!(h.chat.posted()[1].thread_id.as_deref(), Some("100.1"));
    }

    #[tokio::test]
    async fn test_history_is_trimmed() {
        let llm = FakeLanguageModel::new()
            .respond("one", Vec::new())
            .respond("two", Vec::new())
            .respond("three", Vec::new());
        let h = harness(llm, FakeChat::new(), 3);

        for ts in ["100.2", "100.3", "100.4"] {
            h.orchestrator
                .handle_message(&message(ts, ts, &["developer"], Some("100.1")))
                .await;
        }

        let last = &h.llm.requests()[2].history;
        assert_eq!(last.len(), 3);
        assert_eq!(last[0], HistoryEntry::assistant("one"));
    }

    #[tokio::test]
    async fn test_agents_take_turns_with_separate_state() {
        let llm = FakeLanguageModel::new()
            .respond("dev", vec![FunctionCall::new(CREATE_BRANCH, json!({ "name": "b" }))])
            .respond("rev", Vec::new());
        let h = harness(llm, FakeChat::new(), 20);

        let outcomes = h
            .orchestrator
            .handle_message(&message("100.1", "hi", &["developer", "reviewer"], None))
            .await;

        let agents: Vec<&str> = outcomes.iter().map(|o| o.agent_id.as_str()).collect();
        assert_eq!(agents, vec!["developer", "reviewer"]);
        assert!(h.tracker.has_branch("C1:100.1:developer", "b"));
        assert!(!h.tracker.has_branch("C1:100.1:reviewer", "b"));
        assert_eq!(h.chat.posted().len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_posts_apology_and_skips_history() {
        let llm = FakeLanguageModel::new()
            .fail("overloaded")
            .respond("ok", Vec::new());
        let h = harness(llm, FakeChat::new(), 20);

        let outcomes = h
            .orchestrator
            .handle_message(&message("100.1", "hi", &["developer"], None))
            .await;
        assert!(outcomes[0].reply.contains("Sorry"));
        assert!(outcomes[0].records.is_empty());

        h.orchestrator
            .handle_message(&message("100.2", "retry", &["developer"], Some("100.1")))
            .await;
        assert!(h.llm.requests()[1].history.is_empty());
    }

    #[tokio::test]
    async fn test_post_failure_does_not_lose_the_turn() {
        let llm = FakeLanguageModel::new().respond(
            "",
            vec![FunctionCall::new(CREATE_BRANCH, json!({ "name": "b" }))],
        );
        let h = harness(llm, FakeChat::failing(), 20);

        let outcomes = h
            .orchestrator
            .handle_message(&message("100.1", "hi", &["developer"], None))
            .await;

        assert!(outcomes[0].records[0].result.is_success());
        assert_eq!(h.chat.posted().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_mention_is_skipped() {
        let h = harness(FakeLanguageModel::new(), FakeChat::new(), 20);

        let outcomes = h
            .orchestrator
            .handle_message(&message("100.1", "hi", &["ghost"], None))
            .await;

        assert!(outcomes.is_empty());
        assert!(h.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_agent_cannot_call_functions_outside_its_list() {
        let llm = FakeLanguageModel::new().respond(
            "",
            vec![
                FunctionCall::new(CREATE_BRANCH, json!({ "name": "x" })),
                FunctionCall::new(GET_ISSUE, json!({ "number": 42 })),
            ],
        );
        let h = harness(llm, FakeChat::new(), 20);

        let outcomes = h
            .orchestrator
            .handle_message(&message("100.1", "@triage look at #42", &["triage"], None))
            .await;

        let records = &outcomes[0].records;
        assert_eq!(records[0].call.name, CREATE_BRANCH);
        let error = records[0].result.error().unwrap();
        assert_eq!(error, "Function 'createBranch' is not available to agent 'triage'");
        assert!(matches!(records[0].result, CallOutcome::Rejected { .. }));
        assert!(records[1].result.is_success());

        assert_eq!(h.github.count("create_branch"), 0);
        assert_eq!(h.github.count("branch_exists"), 0);
        assert_eq!(h.github.count("get_issue"), 1);
        assert!(h.tracker.get_state("C1:100.1:triage").branches_created.is_empty());
    }

    #[tokio::test]
    async fn test_least_recent_conversation_history_is_evicted() {
        let llm = FakeLanguageModel::new()
            .respond("a", Vec::new())
            .respond("b", Vec::new())
            .respond("c", Vec::new())
            .respond("a again", Vec::new())
            .respond("c again", Vec::new());
        let h = harness_with_capacity(llm, FakeChat::new(), 20, 2);

        for ts in ["100.1", "200.1", "300.1"] {
            h.orchestrator
                .handle_message(&message(ts, ts, &["developer"], None))
                .await;
        }
        h.orchestrator
            .handle_message(&message("100.2", "again", &["developer"], Some("100.1")))
            .await;
        h.orchestrator
            .handle_message(&message("300.2", "again", &["developer"], Some("300.1")))
            .await;

        let requests = h.llm.requests();
        assert!(requests[3].history.is_empty());
        assert_eq!(
            requests[4].history,
            vec![HistoryEntry::user("300.1"), HistoryEntry::assistant("c")]
        );
    }

    #[test]
    fn test_compose_body() {
        assert_eq!(compose_body("  ", &[]), "(no response)");
        assert_eq!(compose_body("Done.", &[]), "Done.");
    }
}

use std::sync::LazyLock;

use regex::Regex;

use crate::agent::definition::AgentCatalog;

static ISSUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:#|\bissue\s+)(\d+)\b").expect("valid issue regex"));

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>|@([\w-]+)").expect("valid mention regex"));

pub fn system_prompt_for_developer(repo_full_name: &str) -> String {
    format!(
        r#"You are Developer, a software engineer agent working on the GitHub repository `{repo_full_name}` on behalf of a team chatting in Slack.

## Workflow
Changes are made exclusively through the functions you are given, in this order:
1. getIssue: read the issue you are asked to work on.
2. createBranch: create a branch for the work, e.g. `feature/issue-<number>`.
3. createCommit: commit the complete contents of every file you change to that branch.
4. createPullRequest: open a pull request from that branch, referencing the issue with "Resolves #<number>".

## Guidelines
- Never call createCommit or createPullRequest for a branch you have not created with createBranch.
- If a function returns an error, read it carefully and correct the call order on your next attempt.
- Keep changes minimal and focused on the issue.
- Reply concisely; your text is posted to Slack."#
    )
}

/// Issue numbers referenced as `#N` or `issue N`, in order of first appearance.
pub fn extract_issue_numbers(text: &str) -> Vec<u64> {
    let mut numbers = Vec::new();
    for caps in ISSUE_RE.captures_iter(text) {
        let Ok(number) = caps[1].parse::<u64>() else {
            continue;
        };
        if !numbers.contains(&number) {
            numbers.push(number);
        }
    }
    numbers
}

/// Append a directive to look up the first referenced issue before doing
/// anything else. Text without an issue reference is returned unchanged.
pub fn enhance_message(text: &str) -> String {
    match extract_issue_numbers(text).first() {
        Some(number) => format!(
            "{text}\n\n[Workflow directive] This request refers to issue #{number}. \
             Call getIssue with number {number} before any other function, then use \
             createBranch → createCommit → createPullRequest in that order."
        ),
        None => text.to_string(),
    }
}

/// Agents addressed by a message, in order of first mention.
///
/// `@Name` tokens match agent ids or names case-insensitively. A Slack user
/// mention of the bot itself (`<@U…>`) addresses the default agent.
pub fn extract_mentions(
    text: &str,
    catalog: &AgentCatalog,
    bot_user_id: Option<&str>,
) -> Vec<String> {
    let mut agents: Vec<String> = Vec::new();
    let mut bot_mentioned = false;

    for caps in MENTION_RE.captures_iter(text) {
        if let Some(user_id) = caps.get(1) {
            if bot_user_id == Some(user_id.as_str()) {
                bot_mentioned = true;
            }
            continue;
        }

        if let Some(agent) = caps.get(2).and_then(|name| catalog.find(name.as_str())) {
            if !agents.contains(&agent.id) {
                agents.push(agent.id.clone());
            }
        }
    }

    if agents.is_empty() && bot_mentioned {
        agents.push(catalog.default_agent().id.clone());
    }

    agents
}

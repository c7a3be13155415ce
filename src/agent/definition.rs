use std::path::Path;

use serde::Deserialize;

use crate::agent::functions::{FunctionRegistry, FunctionSchema};
use crate::agent::prompt;
use crate::config::AgentConfig;
use crate::error::{AppError, Result};

/// A chat-addressable agent: its prompt and the functions it may call.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub functions: Vec<FunctionSchema>,
}

impl AgentDefinition {
    pub fn allows(&self, function: &str) -> bool {
        self.functions.iter().any(|f| f.name == function)
    }

    fn matches(&self, token: &str) -> bool {
        let compact_name: String = self.name.split_whitespace().collect();
        self.id.eq_ignore_ascii_case(token) || compact_name.eq_ignore_ascii_case(token)
    }
}

/// On-disk form of the agent definitions file.
#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    agents: Vec<AgentEntry>,
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    id: String,
    name: String,
    #[serde(default)]
    system_prompt: Option<String>,
    /// Function names; all registered functions when omitted.
    #[serde(default)]
    functions: Option<Vec<String>>,
}

/// The configured agents. Read-only once built.
#[derive(Debug)]
pub struct AgentCatalog {
    agents: Vec<AgentDefinition>,
    default_index: usize,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentDefinition>, default_agent: &str) -> Result<Self> {
        for (i, agent) in agents.iter().enumerate() {
            if agents[..i].iter().any(|other| other.id == agent.id) {
                return Err(AppError::Config(format!(
                    "Duplicate agent id: {}",
                    agent.id
                )));
            }
        }

        let default_index = agents
            .iter()
            .position(|a| a.id == default_agent)
            .ok_or_else(|| {
                AppError::Config(format!("Default agent '{default_agent}' is not defined"))
            })?;

        Ok(Self {
            agents,
            default_index,
        })
    }

    /// Build the catalog from the definitions file, or the built-in developer
    /// agent when no file is configured.
    pub fn load(
        config: &AgentConfig,
        registry: &FunctionRegistry,
        repo_full_name: &str,
    ) -> Result<Self> {
        let agents = match &config.definitions_path {
            Some(path) => load_definitions(path, registry, repo_full_name)?,
            None => vec![AgentDefinition {
                id: config.default_agent.clone(),
                name: "Developer".to_string(),
                system_prompt: prompt::system_prompt_for_developer(repo_full_name),
                functions: registry.schemas(),
            }],
        };

        tracing::info!(
            agents = ?agents.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            default = %config.default_agent,
            "Loaded agent definitions"
        );

        Self::new(agents, &config.default_agent)
    }

    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Resolve a mention token against agent ids and names.
    pub fn find(&self, token: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.matches(token))
    }

    pub fn default_agent(&self) -> &AgentDefinition {
        &self.agents[self.default_index]
    }
}

fn load_definitions(
    path: &Path,
    registry: &FunctionRegistry,
    repo_full_name: &str,
) -> Result<Vec<AgentDefinition>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read agent definitions at {}: {e}",
            path.display()
        ))
    })?;

    let file: DefinitionsFile = toml::from_str(&raw).map_err(|e| {
        AppError::Config(format!(
            "Invalid agent definitions in {}: {e}",
            path.display()
        ))
    })?;

    file.agents
        .into_iter()
        .map(|entry| {
            let functions = match entry.functions {
                Some(names) => names
                    .iter()
                    .map(|name| {
                        registry.schema(name).ok_or_else(|| {
                            AppError::Config(format!(
                                "Agent '{}' references unknown function '{name}'",
                                entry.id
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => registry.schemas(),
            };

            Ok(AgentDefinition {
                system_prompt: entry
                    .system_prompt
                    .unwrap_or_else(|| prompt::system_prompt_for_developer(repo_full_name)),
                id: entry.id,
                name: entry.name,
                functions,
            })
        })
        .collect()
}

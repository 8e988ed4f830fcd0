//! Agent definitions and the registry that resolves role names
//!
//! Seven built-in roles are always present. Custom roles come from markdown
//! persona documents:
//!
//! ```markdown
//! # Security Auditor
//!
//! ## Role
//! Finds vulnerabilities before attackers do.
//!
//! ## Expertise
//! - Threat modelling
//!
//! ## Tools
//! - analyze
//! - search
//!
//! ## Guidelines
//! 1. Cite the affected code path
//! ```

use convoke_core::{AgentRole, ConvokeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Definition of an agent role; immutable once registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub role: AgentRole,
    /// Display name
    pub name: String,
    /// One-line description of the role
    pub description: String,
    /// System instruction sent with every call made as this agent
    pub system_prompt: String,
    pub capabilities: Vec<String>,
    /// Model override
    pub model: Option<String>,
}

impl AgentDefinition {
    fn builtin(role: AgentRole, name: &str, description: &str, system_prompt: &str, tools: &[&str]) -> Self {
        Self {
            role,
            name: name.to_string(),
            description: description.to_string(),
            system_prompt: system_prompt.to_string(),
            capabilities: tools.iter().map(|t| t.to_string()).collect(),
            model: None,
        }
    }

    /// Persona slug or built-in type id
    pub fn slug(&self) -> &str {
        self.role.as_str()
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.slug().eq_ignore_ascii_case(name)
    }
}

fn builtin_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition::builtin(
            AgentRole::Architect,
            "Architect",
            "System Design & Orchestration",
            "You are a senior software architect leading a team of specialists.\n\n\
             Decompose the objective, delegate focused sub-tasks with \
             delegate(agent_name, task_description), integrate the results you \
             receive, and finish with complete(final_result) as soon as you can \
             answer. Never delegate the same task twice.",
            &["delegate", "complete", "analyze", "search"],
        ),
        AgentDefinition::builtin(
            AgentRole::Researcher,
            "Researcher",
            "Information Gathering",
            "You are a research specialist. Gather the relevant facts, \
             summarize them clearly and cite sources where possible.",
            &["search", "analyze", "complete"],
        ),
        AgentDefinition::builtin(
            AgentRole::Coder,
            "Coder",
            "Implementation",
            "You are an expert software developer. Write clean, maintainable \
             code with proper error handling and explain your implementation \
             decisions.",
            &["analyze", "search", "complete"],
        ),
        AgentDefinition::builtin(
            AgentRole::Analyst,
            "Analyst",
            "Data & Pattern Analysis",
            "You are an analysis specialist. Define the problem, identify \
             patterns and root causes, draw conclusions and recommend actions.",
            &["analyze", "search", "complete"],
        ),
        AgentDefinition::builtin(
            AgentRole::Reviewer,
            "Reviewer",
            "Quality Assurance",
            "You are a code reviewer. Check correctness, security, performance \
             and maintainability, and suggest concrete improvements.",
            &["analyze", "complete"],
        ),
        AgentDefinition::builtin(
            AgentRole::Tester,
            "Tester",
            "Testing & Validation",
            "You are a QA specialist. Design test strategies, enumerate edge \
             cases and validate error handling.",
            &["analyze", "complete"],
        ),
        AgentDefinition::builtin(
            AgentRole::Documenter,
            "Documenter",
            "Documentation",
            "You are a technical writer. Produce clear, concise documentation \
             with examples suited to the audience.",
            &["analyze", "search", "complete"],
        ),
    ]
}

/// Registry of built-in and custom agent definitions
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    builtin: Vec<AgentDefinition>,
    custom: Vec<AgentDefinition>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            builtin: builtin_agents(),
            custom: Vec::new(),
        }
    }

    /// Definition for a role id
    pub fn get(&self, role: &AgentRole) -> Option<&AgentDefinition> {
        match role {
            AgentRole::Custom(slug) => self.custom.iter().find(|a| a.slug() == slug),
            _ => self.builtin.iter().find(|a| &a.role == role),
        }
    }

    /// Resolve a delegation target: built-in type id first, then custom
    /// slug or display name
    pub fn resolve(&self, name: &str) -> Option<&AgentDefinition> {
        if let Some(role) = AgentRole::builtin(name) {
            return self.get(&role);
        }
        self.custom.iter().find(|a| a.answers_to(name))
    }

    /// Look up by display name (or slug), custom roles taking precedence
    pub fn get_by_name(&self, name: &str) -> Option<&AgentDefinition> {
        self.custom
            .iter()
            .chain(self.builtin.iter())
            .find(|a| a.answers_to(name))
    }

    pub fn has_custom(&self, name: &str) -> bool {
        self.custom.iter().any(|a| a.answers_to(name))
    }

    /// Register a custom agent, replacing any with the same slug
    pub fn register(&mut self, agent: AgentDefinition) -> Result<()> {
        let AgentRole::Custom(slug) = &agent.role else {
            return Err(ConvokeError::Persona(format!(
                "Cannot replace built-in agent '{}'",
                agent.role
            )));
        };

        if let Some(existing) = self.custom.iter_mut().find(|a| a.slug() == slug) {
            debug!("Replacing custom agent {}", slug);
            *existing = agent;
        } else {
            info!("Registered agent: {}", agent.name);
            self.custom.push(agent);
        }
        Ok(())
    }

    /// Display names of every agent, built-in first
    pub fn list_agents(&self) -> Vec<String> {
        self.builtin
            .iter()
            .chain(self.custom.iter())
            .map(|a| a.name.clone())
            .collect()
    }

    /// Display names of custom agents
    pub fn list_custom_agents(&self) -> Vec<String> {
        self.custom.iter().map(|a| a.name.clone()).collect()
    }

    /// Slugs of custom agents, as the architect should spell them
    pub fn custom_slugs(&self) -> Vec<&str> {
        self.custom.iter().map(|a| a.slug()).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.builtin.iter().chain(self.custom.iter())
    }

    /// Load every `*.md` persona in `dir` (except README.md)
    ///
    /// A missing directory loads nothing. Documents that fail to parse are
    /// logged and skipped. Returns the number of personas registered.
    pub fn load_personas_from_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            debug!("Persona directory {} not found", dir.display());
            return Ok(0);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .filter(|p| {
                !p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case("README.md"))
            })
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let parsed = std::fs::read_to_string(&path)
                .map_err(ConvokeError::from)
                .and_then(|content| parse_persona(slug, &content));

            match parsed {
                Ok(agent) => {
                    self.register(agent)?;
                    loaded += 1;
                }
                Err(e) => warn!("Skipping persona {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} custom personas from {}", loaded, dir.display());
        Ok(loaded)
    }
}

/// Sections copied into a persona's system prompt, in order
const PROMPT_SECTIONS: &[&str] = &["Role", "Expertise", "Capabilities", "Guidelines"];

/// Parse a persona document into a custom agent definition
pub fn parse_persona(slug: &str, content: &str) -> Result<AgentDefinition> {
    if slug.is_empty() || !slug.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(ConvokeError::Persona(format!("Invalid persona slug: {}", slug)));
    }
    if AgentRole::builtin(slug).is_some() {
        return Err(ConvokeError::Persona(format!(
            "Persona '{}' shadows a built-in agent",
            slug
        )));
    }

    let mut title: Option<String> = None;
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim_end();
        if let Some(heading) = trimmed.strip_prefix("## ") {
            sections.push((heading.trim().to_string(), Vec::new()));
        } else if let Some(heading) = trimmed.strip_prefix("# ") {
            if title.is_none() {
                title = Some(heading.trim().to_string());
            }
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(trimmed);
        }
    }

    let section = |name: &str| -> Option<String> {
        sections
            .iter()
            .find(|(heading, _)| heading.eq_ignore_ascii_case(name))
            .map(|(_, body)| body.join("\n").trim().to_string())
            .filter(|body| !body.is_empty())
    };

    let name = title.unwrap_or_else(|| slug.replace(['_', '-'], " "));

    let mut prompt = format!("You are {}.", name);
    for heading in PROMPT_SECTIONS {
        if let Some(body) = section(heading) {
            prompt.push_str(&format!("\n\n{}:\n{}", heading, body));
        }
    }

    let tools: Vec<String> = section("Tools")
        .map(|body| {
            body.lines()
                .filter_map(|l| {
                    let l = l.trim();
                    l.strip_prefix("- ").or_else(|| l.strip_prefix("* "))
                })
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let description = section("Role")
        .and_then(|r| r.lines().next().map(str::to_string))
        .unwrap_or_else(|| name.clone());

    Ok(AgentDefinition {
        role: AgentRole::Custom(slug.to_string()),
        name,
        description,
        system_prompt: prompt,
        capabilities: tools,
        model: None,
    })
}

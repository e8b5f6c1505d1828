use serde::{Deserialize, Serialize};

/// The closed set of generation workers. Each role produces one named
/// section of the final document.
///
/// `WorkerRole::ALL` is the canonical order: workers are launched in it and
/// the compiler emits sections in it, regardless of completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Requirements,
    Architecture,
    ApiSpec,
    DatabaseSchema,
}

impl WorkerRole {
    pub const ALL: [WorkerRole; 4] = [
        WorkerRole::Requirements,
        WorkerRole::Architecture,
        WorkerRole::ApiSpec,
        WorkerRole::DatabaseSchema,
    ];

    pub fn key(self) -> &'static str {
        match self {
            WorkerRole::Requirements => "requirements",
            WorkerRole::Architecture => "architecture",
            WorkerRole::ApiSpec => "api_spec",
            WorkerRole::DatabaseSchema => "database_schema",
        }
    }

    /// Human-readable label used in progress messages.
    pub fn label(self) -> &'static str {
        match self {
            WorkerRole::Requirements => "Technical Requirements",
            WorkerRole::Architecture => "System Design",
            WorkerRole::ApiSpec => "Software Architecture",
            WorkerRole::DatabaseSchema => "Database Schema",
        }
    }

    /// Section heading in the compiled document.
    pub fn section_title(self) -> &'static str {
        match self {
            WorkerRole::Requirements => "Technical Requirements",
            WorkerRole::Architecture => "System Design",
            WorkerRole::ApiSpec => "Software Architecture",
            WorkerRole::DatabaseSchema => "Database Design",
        }
    }

    /// Placeholder text the compiler substitutes when the role's output is
    /// missing or errored.
    pub fn placeholder(self) -> &'static str {
        match self {
            WorkerRole::Requirements => "Requirements analysis pending...",
            WorkerRole::Architecture => "System architecture pending...",
            WorkerRole::ApiSpec => "Software architecture pending...",
            WorkerRole::DatabaseSchema => "Database design pending...",
        }
    }

    /// System prompt handed to the generation call for this role.
    pub fn system_prompt(self) -> &'static str {
        match self {
            WorkerRole::Requirements => {
                "You are a requirements analyst. Extract ALL functional and \
                 non-functional requirements from the SRS document as detailed, \
                 numbered items, plus user roles, business rules and system \
                 constraints where present. Start directly with subsections; do \
                 not repeat the section title."
            }
            WorkerRole::Architecture => {
                "You are a senior software architect. Design a detailed system \
                 architecture for the SRS: server architecture, environment \
                 strategy, technology stack table, third-party integrations and \
                 mermaid system diagrams where useful. Start directly with \
                 subsections; do not repeat the section title."
            }
            WorkerRole::ApiSpec => {
                "You are a software architect. Document the software architecture \
                 for each component in the SRS: technical specification table, \
                 folder structure, layered architecture with responsibilities per \
                 layer. Start directly with component subsections; do not repeat \
                 the section title."
            }
            WorkerRole::DatabaseSchema => {
                "You are a database architect. Extract and document the database \
                 design from the SRS: overview, mermaid entity relationship \
                 diagram, per-table columns, indexes, foreign keys and \
                 relationships. Only document what the SRS supports; start \
                 directly with subsections."
            }
        }
    }
}

/// Outcome of one worker: the generated section text, or the failure message
/// for that role only. A failed role never fails the surrounding run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerResult {
    Ok(String),
    Err(String),
}

impl WorkerResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, WorkerResult::Ok(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_stable() {
        let keys: Vec<&str> = WorkerRole::ALL.iter().map(|r| r.key()).collect();
        assert_eq!(
            keys,
            vec!["requirements", "architecture", "api_spec", "database_schema"]
        );
    }

    #[test]
    fn every_role_has_distinct_prompt_and_placeholder() {
        for a in WorkerRole::ALL {
            for b in WorkerRole::ALL {
                if a != b {
                    assert_ne!(a.system_prompt(), b.system_prompt());
                    assert_ne!(a.placeholder(), b.placeholder());
                }
            }
        }
    }
}

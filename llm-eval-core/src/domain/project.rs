use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use super::ids::ProjectId;

/// Endpoint configuration the backend uses to reach the system under test
/// when an experiment is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LabratConfig {
    pub endpoint: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Project {
    pub id: ProjectId,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub test_endpoint: String,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labrat: Option<LabratConfig>,
}

impl Project {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, test_endpoint: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            api_key: api_key.into(),
            test_endpoint: test_endpoint.into(),
            created_at: Utc::now(),
            labrat: None,
        }
    }

    pub fn with_labrat(mut self, labrat: LabratConfig) -> Self {
        self.labrat = Some(labrat);
        self
    }

    /// The endpoint configuration sent along with a new experiment.
    ///
    /// An explicit labrat block wins; otherwise the plain test endpoint is
    /// used with the project's API key as a bearer header.
    pub fn target_endpoint(&self) -> Option<LabratConfig> {
        if let Some(labrat) = &self.labrat {
            return Some(labrat.clone());
        }
        if self.test_endpoint.trim().is_empty() {
            return None;
        }
        let mut headers = HashMap::new();
        if !self.api_key.is_empty() {
            headers.insert("Authorization".to_string(), format!("Bearer {}", self.api_key));
        }
        Some(LabratConfig {
            endpoint: self.test_endpoint.clone(),
            headers,
        })
    }
}

/// Fields accepted when creating a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct NewProject {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub test_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labrat: Option<LabratConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labrat_config_takes_precedence() {
        let labrat = LabratConfig {
            endpoint: "https://labrat.example.com/chat".to_string(),
            headers: HashMap::from([("X-Key".to_string(), "abc".to_string())]),
        };
        let project = Project::new("demo", "key", "https://api.example.com").with_labrat(labrat.clone());
        assert_eq!(project.target_endpoint(), Some(labrat));
    }

    #[test]
    fn test_endpoint_fallback_uses_api_key() {
        let project = Project::new("demo", "secret", "https://api.example.com/chat");
        let target = project.target_endpoint().unwrap();
        assert_eq!(target.endpoint, "https://api.example.com/chat");
        assert_eq!(target.headers.get("Authorization").unwrap(), "Bearer secret");
    }

    #[test]
    fn no_endpoint_configured() {
        let project = Project::new("demo", "", "  ");
        assert!(project.target_endpoint().is_none());
    }
}

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::MessagePart;

/// `POST /session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// `POST /session/{id}/fork`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForkSessionRequest {
    #[serde(rename = "messageID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// `POST /session/{id}/message` and `POST /session/{id}/prompt_async`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub parts: Vec<MessagePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl PromptRequest {
    /// A prompt carrying a single text part.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            parts: vec![MessagePart::text(content)],
            model: None,
            agent: None,
            system: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_agent(mut self, agent: Option<String>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }
}

/// `POST /session/{id}/command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    pub command: String,
    pub arguments: Vec<String>,
}

/// `POST /session/{id}/shell`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellRequest {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// `PUT /auth/{providerID}` sends the credential map as a flat object.
pub type ProviderCredentials = BTreeMap<String, String>;
